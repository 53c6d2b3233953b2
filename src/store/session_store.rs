//! Client-side session state with write-through persistence.

use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Storage, StorageError};
use crate::models::{AccessToken, PersistedSession, Session, UserProfile};

/// Holds the current `Session` in memory and mirrors every change into a
/// persisted storage entry named by `key`.
///
/// Reads are served from memory. Persistence failures are logged and never
/// reach the caller: a broken disk must not sign the user out.
pub struct SessionStore {
    key: String,
    cache: RwLock<Session>,
    storage: Arc<dyn Storage>,
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Creates an empty store. Nothing is read from storage.
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        SessionStore {
            key: key.into(),
            cache: RwLock::new(Session::default()),
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Creates a store and fills it from the persisted entry, if any.
    /// A missing or unreadable entry leaves the session empty.
    pub async fn rehydrate(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        let store = Self::new(storage, key);
        if !store.is_persistent() {
            return store;
        }

        match store.load_persisted().await {
            Ok(Some(session)) => {
                info!(
                    event_name = "session.rehydrate",
                    event_domain = "session",
                    authenticated = session.is_authenticated(),
                    "session rehydrated from storage"
                );
                *store.cache.write().expect("session cache lock poisoned") = session;
            }
            Ok(None) => debug!("No persisted session under '{}'", store.key),
            Err(e) => warn!(
                event_name = "session.rehydrate.failed",
                event_domain = "session",
                "Ignoring persisted session '{}': {}",
                store.key,
                e
            ),
        }
        store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_persistent(&self) -> bool {
        self.storage.is_enabled()
    }

    pub fn snapshot(&self) -> Session {
        self.cache.read().expect("session cache lock poisoned").clone()
    }

    pub fn token(&self) -> Option<AccessToken> {
        self.cache
            .read()
            .expect("session cache lock poisoned")
            .token
            .clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.cache
            .read()
            .expect("session cache lock poisoned")
            .user
            .clone()
    }

    /// Reads and parses the persisted entry directly, bypassing the cache.
    pub async fn load_persisted(&self) -> Result<Option<Session>, StorageError> {
        let Some(raw) = self.storage.get_item(&self.key).await? else {
            return Ok(None);
        };
        let persisted: PersistedSession = serde_json::from_str(&raw)?;
        Ok(Some(persisted.state))
    }

    /// Replaces the whole session (sign-in).
    pub async fn set_session(&self, session: Session) {
        *self.cache.write().expect("session cache lock poisoned") = session;
        self.persist().await;
    }

    /// Replaces the token, keeping the cached user (refresh).
    pub async fn set_token(&self, token: Option<AccessToken>) {
        self.cache.write().expect("session cache lock poisoned").token = token;
        self.persist().await;
    }

    /// Replaces the cached user profile, keeping the token.
    pub async fn set_user(&self, user: Option<UserProfile>) {
        self.cache.write().expect("session cache lock poisoned").user = user;
        self.persist().await;
    }

    /// Empties the in-memory session without touching storage.
    pub fn clear_cached(&self) {
        *self.cache.write().expect("session cache lock poisoned") = Session::default();
    }

    /// Empties the session and deletes the persisted entry (sign-out).
    pub async fn clear(&self) {
        self.clear_cached();
        self.remove_persisted().await;
    }

    /// Deletes the persisted entry, leaving the cache alone.
    pub async fn remove_persisted(&self) {
        if !self.is_persistent() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.storage.remove_item(&self.key).await {
            warn!("Failed to remove persisted session '{}': {}", self.key, e);
        }
    }

    // The snapshot is taken under the write lock so the last write to land
    // always carries the latest state.
    async fn persist(&self) {
        if !self.is_persistent() {
            return;
        }
        let _guard = self.write_lock.lock().await;
        let envelope = PersistedSession {
            state: self.snapshot(),
            version: 0,
        };
        let serialized = match serde_json::to_string(&envelope) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize session '{}': {}", self.key, e);
                return;
            }
        };
        if let Err(e) = self.storage.set_item(&self.key, &serialized).await {
            warn!(
                event_name = "session.persist.failed",
                event_domain = "session",
                "Failed to persist session '{}': {}",
                self.key,
                e
            );
        }
    }
}
