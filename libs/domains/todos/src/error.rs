//! Error types for the todos domain.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Result type for todo client operations.
pub type TodoResult<T> = Result<T, TodoError>;

const FALLBACK_MESSAGE: &str = "An error occurred";

/// Errors surfaced by the REST client, the account service and the synchronizer.
///
/// `Display` is the human-readable message shown to the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TodoError {
    /// The request never reached the server or the response never arrived.
    #[error("Network error: {0}")]
    Network(String),

    /// Missing, expired or invalid credentials (HTTP 401).
    #[error("{0}")]
    Unauthenticated(String),

    /// The server refused the request (any other 4xx).
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The server failed while handling the request (5xx).
    #[error("{message}")]
    Server { status: u16, message: String },

    /// Input rejected before any request was sent.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The referenced task is not part of the local list.
    #[error("Task not found: {0}")]
    NotFound(i64),

    /// The response body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Reading or writing the stored session failed.
    #[error("Session storage error: {0}")]
    Session(String),

    /// The HTTP client could not be configured.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of [`TodoError`] for callers that branch on failure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Unauthenticated,
    Validation,
    Server,
    Local,
}

impl TodoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TodoError::Network(_) => ErrorKind::Network,
            TodoError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            TodoError::Rejected { .. } | TodoError::Validation(_) => ErrorKind::Validation,
            TodoError::Server { .. } | TodoError::Decode(_) => ErrorKind::Server,
            TodoError::NotFound(_) | TodoError::Session(_) | TodoError::Config(_) => {
                ErrorKind::Local
            }
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.kind() == ErrorKind::Unauthenticated
    }

    /// HTTP status of a response-level failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            TodoError::Unauthenticated(_) => Some(StatusCode::UNAUTHORIZED.as_u16()),
            TodoError::Rejected { status, .. } | TodoError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build the error for a non-2xx response.
    ///
    /// The message is taken from the body's `detail` or `message` field; when
    /// neither is present (or the body is not JSON) the status reason phrase
    /// is used instead.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let message = message_from_body(body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());

        if status == StatusCode::UNAUTHORIZED {
            TodoError::Unauthenticated(message)
        } else if status.is_server_error() {
            TodoError::Server {
                status: status.as_u16(),
                message,
            }
        } else {
            TodoError::Rejected {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn message_from_body(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["detail", "message"]
        .iter()
        .filter_map(|key| value.get(key).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

impl From<reqwest::Error> for TodoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TodoError::Decode(err.to_string())
        } else if err.is_builder() {
            TodoError::Config(err.to_string())
        } else if let Some(status) = err.status() {
            TodoError::from_response(status, &[])
        } else {
            TodoError::Network(err.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for TodoError {
    fn from(err: validator::ValidationErrors) -> Self {
        TodoError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for TodoError {
    fn from(err: std::io::Error) -> Self {
        TodoError::Session(err.to_string())
    }
}

impl From<serde_json::Error> for TodoError {
    fn from(err: serde_json::Error) -> Self {
        TodoError::Session(format!("JSON serialization error: {}", err))
    }
}
