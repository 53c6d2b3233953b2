use serde::{Deserialize, Serialize};
use std::fmt;

use super::session::UserProfile;

/// A bearer access token as issued by the backend.
///
/// The raw value never shows up in `Debug` output, so sessions and requests
/// can be logged freely.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string. Blank input yields `None`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(AccessToken(trimmed.to_string()))
        }
    }

    /// Parses the value of an `Authorization` header ("Bearer <token>").
    pub fn from_authorization_header(value: &str) -> Option<Self> {
        let mut parts = value.split_whitespace();
        let scheme = parts.next()?;
        let credentials = parts.next()?;
        if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        AccessToken::new(credentials)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the token as an `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Body of `POST /auth/signin`.
#[derive(Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response of `POST /auth/signin`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(alias = "access_token")]
    pub access_token: String,
}

/// Response of `POST /auth/refresh`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_token_is_rejected() {
        assert!(AccessToken::new("").is_none());
        assert!(AccessToken::new("   ").is_none());
        assert_eq!(AccessToken::new(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_parse_authorization_header() {
        let token = AccessToken::from_authorization_header("Bearer abc.def").unwrap();
        assert_eq!(token.as_str(), "abc.def");
        assert_eq!(token.bearer(), "Bearer abc.def");

        let lower = AccessToken::from_authorization_header("bearer xyz").unwrap();
        assert_eq!(lower.as_str(), "xyz");

        assert!(AccessToken::from_authorization_header("Basic dXNlcjpwYXNz").is_none());
        assert!(AccessToken::from_authorization_header("Bearer").is_none());
        assert!(AccessToken::from_authorization_header("Bearer a b").is_none());
    }

    #[test]
    fn test_debug_output_is_redacted() {
        let token = AccessToken::new("super-secret").unwrap();
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn test_refresh_response_accepts_both_spellings() {
        let camel: RefreshResponse = serde_json::from_str(r#"{"accessToken": "a"}"#).unwrap();
        let snake: RefreshResponse = serde_json::from_str(r#"{"access_token": "b"}"#).unwrap();
        assert_eq!(camel.access_token, "a");
        assert_eq!(snake.access_token, "b");
    }
}
