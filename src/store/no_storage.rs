use super::{Storage, StorageError};
use async_trait::async_trait;

/// A no-op storage that always returns an error if called,
/// indicating session persistence is disabled.
pub struct NoStorage;

impl NoStorage {
    pub fn new() -> Self {
        NoStorage
    }
}

impl Default for NoStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for NoStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Disabled)
    }

    async fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Disabled)
    }

    async fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_no_storage_get_item() {
        let storage = NoStorage::new();
        let res = storage.get_item("auth-storage").await;
        assert!(
            matches!(res, Err(StorageError::Disabled)),
            "Expected get_item to report disabled storage"
        );
    }

    #[tokio::test]
    async fn test_no_storage_set_item() {
        let storage = NoStorage::new();
        let res = storage.set_item("auth-storage", "{}").await;
        assert!(res.is_err(), "Expected set_item to return an error");
    }

    #[tokio::test]
    async fn test_no_storage_remove_item() {
        let storage = NoStorage::new();
        let res = storage.remove_item("auth-storage").await;
        assert!(res.is_err(), "Expected remove_item to return an error");
    }

    #[test]
    fn test_no_storage_is_disabled() {
        assert!(!NoStorage::new().is_enabled());
    }
}
