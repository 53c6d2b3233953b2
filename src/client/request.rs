use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::error::ApiError;
use crate::config::EndpointConfig;
use crate::models::AccessToken;

/// Which kind of endpoint a request targets. Drives the auth-failure rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    SignIn,
    CurrentUser,
    Refresh,
    Logout,
    Other,
}

impl EndpointKind {
    pub fn classify(path: &str, endpoints: &EndpointConfig) -> Self {
        let path = normalize(path);
        if path == normalize(&endpoints.signin) {
            EndpointKind::SignIn
        } else if path == normalize(&endpoints.me) {
            EndpointKind::CurrentUser
        } else if path == normalize(&endpoints.refresh) {
            EndpointKind::Refresh
        } else if path == normalize(&endpoints.logout) {
            EndpointKind::Logout
        } else {
            EndpointKind::Other
        }
    }

    /// Label used in metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointKind::SignIn => "signin",
            EndpointKind::CurrentUser => "me",
            EndpointKind::Refresh => "refresh",
            EndpointKind::Logout => "logout",
            EndpointKind::Other => "other",
        }
    }
}

fn normalize(path: &str) -> &str {
    let path = path.split(&['?', '#'][..]).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// A request to the backend, built with `ApiClient::request`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) authorization: Option<HeaderValue>,
    pub(crate) body: Option<Value>,
    pub(crate) retried: bool,
    pub(crate) request_id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        ApiRequest {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            authorization: None,
            body: None,
            retried: false,
            request_id: Uuid::new_v4(),
        }
    }

    /// Attaches a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Sets an explicit bearer token. It takes precedence over every other token source.
    pub fn bearer(mut self, token: &AccessToken) -> Self {
        self.authorization = bearer_header(token);
        self
    }

    /// Adds a header. An `Authorization` header is treated like `bearer`:
    /// it is sent as-is and never replaced by a stored token.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        if name == AUTHORIZATION {
            self.authorization = Some(value);
        } else {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn has_explicit_authorization(&self) -> bool {
        self.authorization.is_some()
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }
}

pub(crate) fn bearer_header(token: &AccessToken) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&token.bearer()).ok()?;
    value.set_sensitive(true);
    Some(value)
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        ApiResponse {
            status,
            headers,
            body,
        }
    }

    pub(crate) async fn read(response: reqwest::Response) -> Result<Self, ApiError> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(ApiResponse::new(status, headers, body.to_vec()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body. An empty body reads as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let raw: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(raw).map_err(|e| ApiError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_endpoints() {
        let endpoints = EndpointConfig::default();
        assert_eq!(
            EndpointKind::classify("/auth/signin", &endpoints),
            EndpointKind::SignIn
        );
        assert_eq!(
            EndpointKind::classify("/auth/me?fields=all", &endpoints),
            EndpointKind::CurrentUser
        );
        assert_eq!(
            EndpointKind::classify("/auth/refresh/", &endpoints),
            EndpointKind::Refresh
        );
        assert_eq!(
            EndpointKind::classify("/admin/auth/me", &endpoints),
            EndpointKind::Other
        );
    }

    #[test]
    fn test_authorization_header_is_explicit() {
        let request = ApiRequest::new(Method::GET, "/accounts").header(
            AUTHORIZATION,
            HeaderValue::from_static("Bearer explicit"),
        );
        assert!(request.has_explicit_authorization());
        assert!(request.headers.get(AUTHORIZATION).is_none());

        let request = ApiRequest::new(Method::GET, "/accounts").header(
            HeaderName::from_static("x-trace"),
            HeaderValue::from_static("1"),
        );
        assert!(!request.has_explicit_authorization());
    }

    #[test]
    fn test_json_body() {
        let request = ApiRequest::new(Method::POST, "/transfers")
            .json(&json!({"amount": 10}))
            .unwrap();
        assert_eq!(request.body, Some(json!({"amount": 10})));
    }

    #[test]
    fn test_empty_response_body_reads_as_null() {
        let response = ApiResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Vec::new());
        let value: Option<Value> = response.json().unwrap();
        assert!(value.is_none());
        let _: () = response.json().unwrap();
    }
}
