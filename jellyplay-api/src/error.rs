//! API error types
//!
//! Status branching is modeled as a tagged enum rather than exception-style
//! control flow: call sites match on the variant they care about.

use thiserror::Error;

/// Errors produced by backend HTTP calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server rejected the request with 401.
    #[error("401 Unauthorized")]
    Unauthorized,

    /// The server rejected the request with 403.
    #[error("403 Forbidden")]
    Forbidden,

    /// Any other non-success HTTP status.
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// The request never produced a status (connection, TLS, body decode).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ApiError {
    /// Map a non-success status code to its variant.
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            reqwest::StatusCode::FORBIDDEN => ApiError::Forbidden,
            other => ApiError::Status(other.as_u16()),
        }
    }

    /// The HTTP status carried by this error, if it has one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden => Some(403),
            ApiError::Status(code) => Some(*code),
            ApiError::Transport(err) => err.status().map(|s| s.as_u16()),
        }
    }
}

/// Result type alias for backend operations.
pub type ApiResult<T> = Result<T, ApiError>;
