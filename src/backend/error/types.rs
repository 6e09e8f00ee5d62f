//! Backend error types
//!
//! [`BackendError`] covers the REST surface: each variant maps to an HTTP
//! status and a JSON body. WebSocket-side failures never travel this path:
//! they become protocol `ERROR` frames per the taxonomy in the session
//! router, because a wire client must keep its connection on input errors.

use axum::http::StatusCode;
use thiserror::Error;

use crate::backend::store::StoreError;

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Request-level failure with an explicit status.
    #[error("{message}")]
    Handler {
        status: StatusCode,
        message: String,
    },

    /// Missing or unverifiable bearer token on an auth-required route.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The addressed resource does not exist or is not owned by the caller.
    /// Ownership failures intentionally read as 404 so private board ids
    /// are not probeable.
    #[error("not found")]
    NotFound,

    /// Persistence failure underneath a handler.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Handler {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// The HTTP status this error renders as.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Handler { status, .. } => *status,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message carried in the JSON body. Internal failures are not
    /// echoed verbatim to clients.
    pub fn message(&self) -> String {
        match self {
            Self::Handler { message, .. } => message.clone(),
            Self::Unauthorized { message } => message.clone(),
            Self::NotFound => "not found".to_string(),
            Self::Store(_) => "internal storage error".to_string(),
            Self::Serialization(_) => "internal serialization error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_keeps_its_status() {
        let err = BackendError::handler(StatusCode::BAD_REQUEST, "bad body");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "bad body");
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let err = BackendError::unauthorized("missing bearer token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn store_errors_do_not_leak_details() {
        let err = BackendError::Store(StoreError::Timeout);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "internal storage error");
    }

    #[test]
    fn not_found_hides_ownership() {
        assert_eq!(BackendError::NotFound.status_code(), StatusCode::NOT_FOUND);
    }
}
