//! In-memory store.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::NotifiedStore;
use crate::error::StoreError;

/// Keeps the announced set in memory. Useful for tests and one-off runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ids: Mutex<HashSet<String>>,
}

impl MemoryStore {
    /// Create a store holding `ids`.
    #[must_use]
    pub fn new(ids: HashSet<String>) -> Self {
        Self {
            ids: Mutex::new(ids),
        }
    }

    /// Current contents.
    pub async fn snapshot(&self) -> HashSet<String> {
        self.ids.lock().await.clone()
    }
}

#[async_trait]
impl NotifiedStore for MemoryStore {
    async fn load(&self) -> Result<HashSet<String>, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn save(&self, ids: &HashSet<String>) -> Result<(), StoreError> {
        *self.ids.lock().await = ids.clone();
        Ok(())
    }
}
