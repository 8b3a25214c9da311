//! In-process store. State is lost on restart.

use {async_trait::async_trait, dashmap::DashMap};

use {pelangi_common::ConversationKey, pelangi_workflow::WorkflowInstance};

use crate::{Result, record::ConversationRecord, store::ConversationStore};

#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<ConversationKey, ConversationRecord>,
    archive: DashMap<ConversationKey, Vec<WorkflowInstance>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, key: &ConversationKey) -> Result<Option<ConversationRecord>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn save(&self, record: &ConversationRecord) -> Result<()> {
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, key: &ConversationKey) -> Result<bool> {
        self.archive.remove(key);
        Ok(self.records.remove(key).is_some())
    }

    async fn archive(&self, instance: &WorkflowInstance) -> Result<()> {
        self.archive
            .entry(instance.conversation_key.clone())
            .or_default()
            .push(instance.clone());
        Ok(())
    }

    async fn archived(&self, key: &ConversationKey, limit: usize) -> Result<Vec<WorkflowInstance>> {
        Ok(self
            .archive
            .get(key)
            .map(|list| list.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn pending_retries(&self) -> Result<Vec<ConversationKey>> {
        let mut keys: Vec<ConversationKey> = self
            .records
            .iter()
            .filter(|r| r.pending_retry.is_some())
            .map(|r| r.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
