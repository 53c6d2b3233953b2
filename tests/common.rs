#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use portal_client::config::ApiConfig;
use portal_client::models::{AccessToken, Session};
use portal_client::store::{MemoryStorage, SessionStore, Storage, StorageError};
use portal_client::ApiClient;

pub const STORAGE_KEY: &str = "auth-storage";

/// Wraps a storage backend and counts how often it is read.
pub struct CountingStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
}

impl CountingStorage {
    pub fn new(inner: MemoryStorage) -> Self {
        CountingStorage {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub async fn raw(&self) -> Option<String> {
        self.inner
            .get_item(STORAGE_KEY)
            .await
            .expect("memory storage never fails")
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.inner.set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove_item(key).await
    }
}

pub fn token(raw: &str) -> AccessToken {
    AccessToken::new(raw).expect("test token must not be blank")
}

/// A client pointed at `base_url` whose session lives in `storage`.
pub fn client_with_storage(base_url: &str, storage: Arc<dyn Storage>) -> ApiClient {
    let session = Arc::new(SessionStore::new(storage, STORAGE_KEY));
    ApiClient::new(&ApiConfig::new(base_url), session).expect("failed to build client")
}

/// A client that is already signed in with `access_token`.
pub async fn signed_in_client(
    base_url: &str,
    access_token: &str,
) -> (ApiClient, Arc<CountingStorage>) {
    let storage = Arc::new(CountingStorage::new(MemoryStorage::new()));
    let client = client_with_storage(base_url, storage.clone());
    client
        .session()
        .set_session(Session::new(None, Some(token(access_token))))
        .await;
    client.set_default_token(Some(token(access_token)));
    (client, storage)
}

pub fn refresh_body(access_token: &str) -> String {
    format!(r#"{{"accessToken": "{}"}}"#, access_token)
}
