//! One async mutex per conversation so messages for the same key are
//! handled strictly in arrival order while other keys run concurrently.

use std::sync::Arc;

use {
    dashmap::{DashMap, mapref::entry::Entry},
    pelangi_common::ConversationKey,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

#[derive(Clone, Default)]
pub struct ConversationLocks {
    locks: Arc<DashMap<ConversationKey, Arc<Mutex<()>>>>,
}

/// Held while one message is handled. Dropping it releases the key and
/// forgets the mutex once nobody else is queued on it.
pub struct ConversationGuard {
    key: ConversationKey,
    locks: Arc<DashMap<ConversationKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl ConversationLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &ConversationKey) -> ConversationGuard {
        let mutex = match self.locks.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => Arc::clone(entry.insert(Arc::new(Mutex::new(()))).value()),
        };
        let guard = mutex.lock_owned().await;
        ConversationGuard {
            key: key.clone(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Keys with a live mutex (held or awaited).
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // The map holds one reference; any other means a waiter.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
