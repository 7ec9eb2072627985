//! Error types for the wiki server.
//!
//! [`ServerError`] is what route handlers return. It renders as a JSON body
//! of the form `{"error": "...", "code": "..."}` with a status code that
//! separates caller mistakes (4xx) from server failures (5xx).
//!
//! # Example
//!
//! ```rust,ignore
//! use wiki_server::error::ServerError;
//!
//! fn require_path(path: Option<String>) -> Result<String, ServerError> {
//!     path.ok_or_else(|| ServerError::validation("missing_path", "query parameter 'path' is required"))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use wiki_history::error::HistoryError;

/// Top-level error type for the wiki server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Request validation failure.
    #[error("validation error: {message}")]
    Validation {
        /// Machine-readable error code.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },

    /// The history tracker rejected or failed the operation.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Unexpected internal server error.
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates a new validation error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use wiki_server::error::ServerError;
    ///
    /// let err = ServerError::validation("missing_path", "query parameter 'path' is required");
    /// assert!(err.is_client_error());
    /// ```
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    /// Creates a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` if this error indicates a client-side problem.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Validation { .. } => true,
            Self::History(err) => err.is_client_error(),
            Self::Internal(_) => false,
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code, .. } => *code,
            Self::History(HistoryError::InvalidPath(_)) => "invalid_path",
            Self::History(_) => "history_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Server-side details stay in the log.
        let message = if status.is_server_error() {
            error!(error = %self, code = self.code(), "Request failed");
            "history service unavailable".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse::new(message).with_code(self.code()))).into_response()
    }
}

/// A specialized Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_is_bad_request() {
        let err = ServerError::validation("missing_path", "query parameter 'path' is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "missing_path");
        assert_eq!(
            err.to_string(),
            "validation error: query parameter 'path' is required"
        );
    }

    #[test]
    fn invalid_history_path_is_bad_request() {
        let err: ServerError = HistoryError::InvalidPath("../x".to_string()).into();
        assert!(err.is_client_error());
        assert_eq!(err.code(), "invalid_path");
        assert_eq!(err.to_string(), "invalid history path '../x'");
    }

    #[test]
    fn store_failure_is_server_error() {
        let err: ServerError = HistoryError::StoreUnavailable("poisoned".to_string()).into();
        assert!(!err.is_client_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "history_unavailable");
    }

    #[test]
    fn internal_error_displays_correctly() {
        let err = ServerError::internal("task panicked");
        assert_eq!(err.to_string(), "internal server error: task panicked");
        assert_eq!(err.code(), "internal_error");
    }

    #[tokio::test]
    async fn response_body_hides_server_details() {
        let err: ServerError = HistoryError::StoreUnavailable("lock poisoned".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("history_unavailable"));
        assert!(!parsed.error.contains("poisoned"));
    }

    #[test]
    fn error_response_omits_absent_code() {
        let json = serde_json::to_string(&ErrorResponse::new("oops")).unwrap();
        assert_eq!(json, r#"{"error":"oops"}"#);
    }
}
