use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use super::request::{ApiResponse, EndpointKind};

/// Every failure an API call can surface to its caller.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The sign-in endpoint rejected the credentials.
    #[error("{message}")]
    InvalidCredentials { message: String },

    /// An authentication failure that could not be recovered by a refresh.
    #[error("{message}")]
    Unauthorized { status: u16, message: String },

    /// Any other non-success response.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// No response was received.
    #[error("network error: {0}")]
    Transport(String),

    /// A request or response body could not be (de)serialized.
    #[error("invalid JSON payload: {0}")]
    Serialization(String),
}

impl ApiError {
    /// The HTTP status of the failed response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::InvalidCredentials { .. } => Some(StatusCode::UNAUTHORIZED.as_u16()),
            ApiError::Unauthorized { status, .. } | ApiError::Api { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Serialization(_) => None,
        }
    }

    /// The human-readable message for the caller to display.
    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidCredentials { message }
            | ApiError::Unauthorized { message, .. }
            | ApiError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::InvalidCredentials { .. }
        )
    }

    /// Normalizes a non-success response.
    pub(crate) fn from_response(kind: EndpointKind, response: &ApiResponse) -> Self {
        let status = response.status();
        let message = extract_message(response);

        if status == StatusCode::UNAUTHORIZED && kind == EndpointKind::SignIn {
            ApiError::InvalidCredentials { message }
        } else if is_auth_failure(kind, status) {
            ApiError::Unauthorized {
                status: status.as_u16(),
                message,
            }
        } else {
            ApiError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// 401 anywhere, or 404 on the current-user endpoint.
pub(crate) fn is_auth_failure(kind: EndpointKind, status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
        || (status == StatusCode::NOT_FOUND && kind == EndpointKind::CurrentUser)
}

/// The structured error body the backend sends with most failures.
#[derive(Deserialize, Debug, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<MessageField>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Validation failures carry a list of messages instead of a single one.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum MessageField {
    One(String),
    Many(Vec<String>),
}

impl MessageField {
    fn into_text(self) -> Option<String> {
        let text = match self {
            MessageField::One(message) => message,
            MessageField::Many(messages) => messages.join(", "),
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

fn extract_message(response: &ApiResponse) -> String {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);

    if is_json {
        if let Ok(body) = serde_json::from_slice::<ErrorBody>(response.body()) {
            if let Some(message) = body.message.and_then(MessageField::into_text) {
                return message;
            }
            if let Some(error) = body.error.filter(|e| !e.trim().is_empty()) {
                return error;
            }
        }
    }

    format!("Request failed with status code {}", response.status().as_u16())
}
