//! Persistence for the set of announced stream IDs.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreError;

/// Durable set of announced stream IDs.
///
/// Loaded once at the start of a run and saved once at the end.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotifiedStore: Send + Sync {
    /// Load the announced set. A missing store is an empty set.
    async fn load(&self) -> Result<HashSet<String>, StoreError>;

    /// Replace the stored set.
    async fn save(&self, ids: &HashSet<String>) -> Result<(), StoreError>;
}
