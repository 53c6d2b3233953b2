use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::{file_storage::FileStorage, memory_storage::MemoryStorage, no_storage::NoStorage};
use crate::config::{StorageBackend, StorageConfig};

/// Errors raised by a persisted storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("session storage is disabled")]
    Disabled,
    #[error("session storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persisted session is corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// The Storage trait abstracts the persisted key/value entries the session
/// store reads and writes (the equivalent of browser local storage).
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
    fn is_enabled(&self) -> bool {
        // Only NoStorage reports false, so callers can skip it instead of
        // logging a failure on every read
        true
    }
}

/// Creates a concrete storage backend from the StorageConfig.
/// If `enabled = false` or no backend is configured, returns NoStorage.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    if !config.enabled {
        info!("Session persistence is disabled. Using NoStorage.");
        return Ok(Arc::new(NoStorage::new()));
    }

    match &config.backend {
        Some(StorageBackend::File(file_config)) => {
            let storage = FileStorage::open(&file_config.dir).await?;
            info!("Persisting session under '{}'.", file_config.dir.display());
            Ok(Arc::new(storage))
        }
        Some(StorageBackend::Memory) => {
            info!("Persisting session in memory only.");
            Ok(Arc::new(MemoryStorage::new()))
        }
        None => {
            info!("Session persistence is enabled but no backend is configured. Using NoStorage.");
            Ok(Arc::new(NoStorage::new()))
        }
    }
}
