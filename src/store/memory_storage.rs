use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Storage, StorageError};

/// Keeps entries in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage already holding one entry.
    pub fn with_item(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .entries
            .lock()
            .expect("memory storage mutex poisoned")
            .insert(key.to_string(), value.to_string());
        storage
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().expect("memory storage mutex poisoned");
        Ok(entries.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("memory storage mutex poisoned");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().expect("memory storage mutex poisoned");
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::with_item("auth-storage", "first");
        assert_eq!(
            storage.get_item("auth-storage").await.unwrap().as_deref(),
            Some("first")
        );

        storage.set_item("auth-storage", "second").await.unwrap();
        assert_eq!(
            storage.get_item("auth-storage").await.unwrap().as_deref(),
            Some("second")
        );

        storage.remove_item("auth-storage").await.unwrap();
        assert!(storage.get_item("auth-storage").await.unwrap().is_none());
    }
}
