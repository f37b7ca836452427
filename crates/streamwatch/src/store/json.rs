//! JSON file store.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::NotifiedStore;
use crate::error::StoreError;

/// Stores announced IDs as a JSON array in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl NotifiedStore for JsonFileStore {
    async fn load(&self) -> Result<HashSet<String>, StoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No state file yet, starting empty");
                return Ok(HashSet::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "State file is corrupt, starting empty"
                );
                Ok(HashSet::new())
            }
        }
    }

    async fn save(&self, ids: &HashSet<String>) -> Result<(), StoreError> {
        let mut sorted: Vec<&String> = ids.iter().collect();
        sorted.sort();
        let content = serde_json::to_string_pretty(&sorted)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        // Write then rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), count = ids.len(), "Saved notified set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("notified.json"));

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notified.json");
        std::fs::write(&path, "{ not an array").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state/notified.json");
        let store = JsonFileStore::new(&path);

        store.save(&ids(&["b", "a"])).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let on_disk: Vec<String> = serde_json::from_str(&content).unwrap();
        assert_eq!(on_disk, ["a", "b"]);
        assert_eq!(store.load().await.unwrap(), ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("notified.json"));

        store.save(&ids(&["a"])).await.unwrap();
        store.save(&ids(&["a", "c"])).await.unwrap();

        assert_eq!(store.load().await.unwrap(), ids(&["a", "c"]));
    }

    #[tokio::test]
    async fn test_save_into_unwritable_location_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let store = JsonFileStore::new(blocker.join("notified.json"));
        let err = store.save(&ids(&["a"])).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }
}
