//! Client construction from configuration.
//!
//! Opens the configured session storage, rehydrates the session from it and
//! builds the API client on top.

use std::sync::Arc;
use tracing::info;

use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::store::{create_storage, SessionStore};

/// Builds a ready-to-use client.
///
/// A token found in the persisted session becomes the default authorization
/// before the first request is sent.
///
/// # Errors
///
/// Returns an error if the storage backend cannot be opened or the HTTP
/// client cannot be built.
pub async fn build_client(config: &ConfigV1) -> Result<ApiClient, Box<dyn std::error::Error>> {
    let storage = create_storage(&config.session.storage).await?;
    let session =
        Arc::new(SessionStore::rehydrate(storage, config.session.storage_key.clone()).await);

    info!(
        "Session '{}' loaded (authenticated: {})",
        session.key(),
        session.snapshot().is_authenticated()
    );

    let client = ApiClient::new(&config.api, session)?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, LoggingConfig, SessionConfig};
    use crate::config::{FileStorageConfig, StorageBackend, StorageConfig};
    use crate::models::AccessToken;

    fn config(session: SessionConfig) -> ConfigV1 {
        ConfigV1 {
            api: ApiConfig::new("http://localhost:5000/api"),
            session,
            logging: LoggingConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_build_client_without_persistence() {
        let client = build_client(&config(SessionConfig::default())).await.unwrap();
        assert!(!client.session().is_persistent());
        assert!(client.default_token().is_none());
    }

    #[tokio::test]
    async fn test_build_client_rehydrates_file_session() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("auth-storage.json"),
            r#"{"state":{"user":null,"token":"persisted"},"version":0}"#,
        )
        .unwrap();

        let session = SessionConfig {
            storage: StorageConfig {
                enabled: true,
                backend: Some(StorageBackend::File(FileStorageConfig {
                    dir: dir.path().to_path_buf(),
                })),
            },
            ..SessionConfig::default()
        };
        let client = build_client(&config(session)).await.unwrap();

        assert!(client.session().is_persistent());
        assert_eq!(client.default_token(), AccessToken::new("persisted"));
    }
}
