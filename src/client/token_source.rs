//! Ordered strategies for finding the bearer token of an outgoing request.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::models::AccessToken;
use crate::store::SessionStore;
use crate::utils::log_throttle::should_emit;

const STORAGE_WARNING_WINDOW: Duration = Duration::from_secs(60);

/// The client-wide "current bearer token" slot.
///
/// Written synchronously on sign-in, refresh and rehydration so requests
/// issued right after see the new token before any persistence write lands.
#[derive(Debug, Default)]
pub struct DefaultAuthorization {
    token: RwLock<Option<AccessToken>>,
}

impl DefaultAuthorization {
    pub fn new(token: Option<AccessToken>) -> Self {
        DefaultAuthorization {
            token: RwLock::new(token),
        }
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.token
            .read()
            .expect("default authorization lock poisoned")
            .clone()
    }

    pub fn set(&self, token: Option<AccessToken>) {
        *self
            .token
            .write()
            .expect("default authorization lock poisoned") = token;
    }
}

/// A place a token may be found.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A descriptive name for the source (for logs/debug).
    fn get_name(&self) -> &str;

    async fn resolve(&self) -> Option<AccessToken>;
}

/// The client-wide default slot.
pub struct DefaultHeaderSource {
    slot: Arc<DefaultAuthorization>,
}

impl DefaultHeaderSource {
    pub fn new(slot: Arc<DefaultAuthorization>) -> Self {
        Self { slot }
    }
}

#[async_trait]
impl TokenSource for DefaultHeaderSource {
    fn get_name(&self) -> &str {
        "default-header"
    }

    async fn resolve(&self) -> Option<AccessToken> {
        self.slot.get()
    }
}

/// The session store's in-memory token.
pub struct SessionCacheSource {
    session: Arc<SessionStore>,
}

impl SessionCacheSource {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenSource for SessionCacheSource {
    fn get_name(&self) -> &str {
        "session-cache"
    }

    async fn resolve(&self) -> Option<AccessToken> {
        self.session.token()
    }
}

/// The token in the persisted session entry. Read failures are logged
/// (throttled) and treated as "no token".
pub struct PersistedSessionSource {
    session: Arc<SessionStore>,
}

impl PersistedSessionSource {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl TokenSource for PersistedSessionSource {
    fn get_name(&self) -> &str {
        "persisted-session"
    }

    async fn resolve(&self) -> Option<AccessToken> {
        match self.session.load_persisted().await {
            Ok(session) => session.and_then(|s| s.token),
            Err(e) => {
                if let Some(suppressed_count) =
                    should_emit("session.storage.read_failed", STORAGE_WARNING_WINDOW)
                {
                    warn!(
                        event_name = "session.storage.read_failed",
                        event_domain = "session",
                        storage_key = self.session.key(),
                        suppressed_count,
                        "Could not read persisted session; sending request without it: {}",
                        e
                    );
                }
                None
            }
        }
    }
}

/// Tries each source in order and stops at the first token found.
pub struct TokenResolver {
    sources: Vec<Box<dyn TokenSource>>,
}

impl TokenResolver {
    pub fn new(sources: Vec<Box<dyn TokenSource>>) -> Self {
        Self { sources }
    }

    /// Default slot, then session cache, then persisted storage (when enabled).
    pub fn standard(slot: Arc<DefaultAuthorization>, session: Arc<SessionStore>) -> Self {
        let mut sources: Vec<Box<dyn TokenSource>> = vec![
            Box::new(DefaultHeaderSource::new(slot)),
            Box::new(SessionCacheSource::new(session.clone())),
        ];
        if session.is_persistent() {
            sources.push(Box::new(PersistedSessionSource::new(session)));
        }
        Self::new(sources)
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.get_name()).collect()
    }

    pub async fn resolve(&self) -> Option<AccessToken> {
        for source in &self.sources {
            if let Some(token) = source.resolve().await {
                debug!("Using bearer token from '{}'", source.get_name());
                return Some(token);
            }
        }
        debug!("No bearer token available; sending request unauthenticated");
        None
    }
}
