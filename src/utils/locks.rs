//! Per-document async locks
//!
//! There is no global catalog lock. Work on the same document id is
//! serialized through one `tokio::sync::Mutex` per id; different ids never
//! contend.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct DocumentLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`.
    pub async fn lock(&self, document_id: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is not held across the await
        let mutex = self
            .locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop entries nobody holds or waits on.
    pub fn prune_idle(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
