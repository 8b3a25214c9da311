//! Persistence trait for conversation records and archived instances.

use async_trait::async_trait;

use {pelangi_common::ConversationKey, pelangi_workflow::WorkflowInstance};

use crate::{Result, record::ConversationRecord};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, key: &ConversationKey) -> Result<Option<ConversationRecord>>;

    /// Insert or replace the record for `record.key`.
    async fn save(&self, record: &ConversationRecord) -> Result<()>;

    async fn delete(&self, key: &ConversationKey) -> Result<bool>;

    /// Keep a finished instance for later inspection.
    async fn archive(&self, instance: &WorkflowInstance) -> Result<()>;

    /// Archived instances for one conversation, newest first.
    async fn archived(&self, key: &ConversationKey, limit: usize) -> Result<Vec<WorkflowInstance>>;

    /// Conversations whose last message still needs handling.
    async fn pending_retries(&self) -> Result<Vec<ConversationKey>>;
}
