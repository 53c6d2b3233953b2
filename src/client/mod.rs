//! The authenticated API client.
//!
//! Every request goes through one pipeline: resolve a bearer token, send,
//! and on an authentication failure join (or start) the single shared token
//! refresh and re-issue the request once with the new token.

mod auth;
pub mod error;
pub mod refresh;
pub mod request;
pub mod token_source;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, FutureExt};
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

pub use error::{ApiError, ErrorBody};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse, EndpointKind};
pub use token_source::{DefaultAuthorization, TokenResolver, TokenSource};

use self::error::is_auth_failure;
use self::request::bearer_header;
use crate::config::{ApiConfig, EndpointConfig};
use crate::events::{EventBus, PortalEvent};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{AccessToken, RefreshResponse};
use crate::store::SessionStore;

/// A cheaply clonable handle to the backend. Clones share the connection
/// pool, cookie jar, default authorization, session and pending refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: String,
    endpoints: EndpointConfig,
    default_auth: Arc<DefaultAuthorization>,
    session: Arc<SessionStore>,
    tokens: TokenResolver,
    refresh: RefreshCoordinator,
    events: EventBus,
    metrics: Metrics,
}

impl ApiClient {
    /// Builds a client on top of an already rehydrated session store.
    /// A token found in the session seeds the default authorization.
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_in_ms))
            .cookie_store(config.with_credentials)
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {}", e)))?;

        let default_auth = Arc::new(DefaultAuthorization::new(session.token()));
        let tokens = TokenResolver::standard(default_auth.clone(), session.clone());

        info!(
            "Creating API client for '{}' (token sources: {})",
            config.base_url,
            tokens.source_names().join(", ")
        );

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url: config.base_url.trim_end_matches('/').to_string(),
                endpoints: config.endpoints.clone(),
                default_auth,
                session,
                tokens,
                refresh: RefreshCoordinator::new(),
                events: EventBus::default(),
                metrics: Metrics::new(),
            }),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.inner.session
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.inner.endpoints
    }

    /// The token currently installed as the default authorization.
    pub fn default_token(&self) -> Option<AccessToken> {
        self.inner.default_auth.get()
    }

    /// Replaces the default authorization for every clone of this client.
    pub fn set_default_token(&self, token: Option<AccessToken>) {
        self.inner.default_auth.set(token);
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    pub fn request(&self, method: Method, path: impl Into<String>) -> ApiRequest {
        ApiRequest::new(method, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(self.request(Method::GET, path)).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::POST, path).json(body)?)
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PUT, path).json(body)?)
            .await
    }

    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.request(Method::PATCH, path).json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(self.request(Method::DELETE, path)).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    /// Sends a request, recovering once from an expired access token.
    ///
    /// An authentication failure joins the pending refresh, reuses the outcome
    /// of a refresh that resolved after the request was sent, or starts a new
    /// one, then re-issues the request once. Failures of the sign-in and
    /// refresh endpoints are returned as-is. Logout failures are too, beyond
    /// those two: `logout_background` clears the session before its call
    /// lands, and a refresh there would install a token again.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let kind = EndpointKind::classify(&request.path, &self.inner.endpoints);
        let metrics = &self.inner.metrics;
        let started = Instant::now();

        let result = loop {
            // Read before the token is resolved, so a refresh resolving
            // while this request is in flight is always seen as newer.
            let generation = self.inner.refresh.generation();
            let response = match self.dispatch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    metrics.record_request(kind.as_str(), "transport_error");
                    break Err(e);
                }
            };

            let status = response.status();
            if status.is_success() {
                metrics.record_request(kind.as_str(), "success");
                break Ok(response);
            }

            let error = ApiError::from_response(kind, &response);
            if !is_auth_failure(kind, status) {
                metrics.record_request(kind.as_str(), "error");
                break Err(error);
            }
            metrics.record_request(kind.as_str(), "auth_failure");

            // Bad credentials and a rejected refresh are final. So is a
            // rejected logout: refreshing there would revive the session.
            if matches!(
                kind,
                EndpointKind::SignIn | EndpointKind::Refresh | EndpointKind::Logout
            ) || request.retried
            {
                debug!(
                    request_id = %request.request_id,
                    path = request.path.as_str(),
                    status = status.as_u16(),
                    "Authentication failure is final"
                );
                break Err(error);
            }
            request.retried = true;

            let token = self
                .inner
                .refresh
                .run_after(generation, || self.refresh_flight())
                .await;
            if token.is_some() {
                metrics.record_retry("refreshed");
            }

            match token.as_ref().and_then(bearer_header) {
                Some(header) => {
                    debug!(
                        request_id = %request.request_id,
                        path = request.path.as_str(),
                        "Re-issuing request with a fresh token"
                    );
                    request.authorization = Some(header);
                }
                None => break Err(error),
            }
        };

        metrics.record_request_duration(kind.as_str(), started.elapsed().as_secs_f64());
        result
    }

    /// Joins the pending token refresh, or starts one. Returns the new token,
    /// or `None` when the refresh failed.
    pub async fn refresh(&self) -> Option<AccessToken> {
        self.inner.refresh.run(|| self.refresh_flight()).await
    }

    // Returns a boxed future: the refresh goes back through `send`.
    fn refresh_flight(&self) -> BoxFuture<'static, Option<AccessToken>> {
        let client = self.clone();
        async move {
            let request = client.request(Method::POST, client.inner.endpoints.refresh.clone());
            let outcome = match client.send(request).await {
                Ok(response) => response.json::<RefreshResponse>().and_then(|body| {
                    AccessToken::new(body.access_token).ok_or_else(|| {
                        ApiError::Serialization("refresh response carried no access token".into())
                    })
                }),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(token) => {
                    client.install_token(token.clone()).await;
                    client.inner.metrics.record_refresh("success");
                    info!(
                        event_name = "auth.refresh.success",
                        event_domain = "auth",
                        "access token refreshed"
                    );
                    Some(token)
                }
                Err(e) => {
                    client.inner.metrics.record_refresh("failure");
                    warn!(
                        event_name = "auth.refresh.failed",
                        event_domain = "auth",
                        status = e.status().unwrap_or_default(),
                        "Token refresh failed: {}",
                        e
                    );
                    client.inner.events.publish(PortalEvent::SessionExpired);
                    None
                }
            }
        }
        .boxed()
    }

    /// The default slot is written first so requests issued while the
    /// session is being persisted already carry the new token.
    async fn install_token(&self, token: AccessToken) {
        self.inner.default_auth.set(Some(token.clone()));
        self.inner.session.set_token(Some(token)).await;
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.path);
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());

        let authenticated = match &request.authorization {
            Some(value) => {
                builder = builder.header(AUTHORIZATION, value.clone());
                true
            }
            None => match self.inner.tokens.resolve().await {
                Some(token) => {
                    builder = builder.bearer_auth(token.as_str());
                    true
                }
                None => false,
            },
        };

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            request_id = %request.request_id,
            method = %request.method,
            path = request.path.as_str(),
            authenticated,
            retry = request.retried,
            "Sending API request"
        );

        let response = builder.send().await.map_err(|e| {
            warn!(
                request_id = %request.request_id,
                path = request.path.as_str(),
                "API request failed without a response: {}",
                e
            );
            ApiError::Transport(e.without_url().to_string())
        })?;
        let response = ApiResponse::read(response).await?;

        debug!(
            request_id = %request.request_id,
            status = response.status().as_u16(),
            "Received API response"
        );
        Ok(response)
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.inner.base_url, path)
        } else {
            format!("{}/{}", self.inner.base_url, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NoStorage;

    fn client(base_url: &str) -> ApiClient {
        let session = Arc::new(SessionStore::new(Arc::new(NoStorage::new()), "auth-storage"));
        ApiClient::new(&ApiConfig::new(base_url), session).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let client = client("http://localhost:5000/api/");
        assert_eq!(
            client.url_for("/auth/me"),
            "http://localhost:5000/api/auth/me"
        );
        assert_eq!(
            client.url_for("accounts"),
            "http://localhost:5000/api/accounts"
        );
        assert_eq!(
            client.url_for("https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
    }

    #[test]
    fn test_clones_share_default_authorization() {
        let first = client("http://localhost");
        let second = first.clone();

        first.set_default_token(AccessToken::new("shared"));
        assert_eq!(second.default_token(), AccessToken::new("shared"));
    }
}
