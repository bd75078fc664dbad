//! Error types for spz-planner
//!
//! Every handler returns [`ApiResult`]. The JSON body carries a machine code,
//! a human message and whether repeating the same request may succeed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown module slug, user or conversation (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Storage read or write failed (503, transient)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Text generation or result parsing failed (502, safe to retry)
    #[error("Analysis failed: {0}")]
    Analysis(String),

    /// Missing, unknown or expired credentials (401)
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Authenticated but not allowed: unapproved or not an admin (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Persistence(_) => (StatusCode::SERVICE_UNAVAILABLE, "PERSISTENCE_ERROR"),
            ApiError::Analysis(_) => (StatusCode::BAD_GATEWAY, "ANALYSIS_ERROR"),
            ApiError::Auth(_) => (StatusCode::UNAUTHORIZED, "AUTH_ERROR"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Whether the client may repeat the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Persistence(_) | ApiError::Analysis(_))
    }
}

impl From<spz_common::Error> for ApiError {
    fn from(err: spz_common::Error) -> Self {
        use spz_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Database(e) => ApiError::Persistence(e.to_string()),
            Error::Serialization(e) => ApiError::Persistence(e.to_string()),
            Error::Io(e) => ApiError::Internal(e.to_string()),
            Error::Config(msg) | Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let retryable = self.is_retryable();

        if status.is_server_error() {
            error!(code, "{}", self);
        } else {
            warn!(code, "{}", self);
        }

        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::Persistence(msg)
            | ApiError::Analysis(msg)
            | ApiError::Auth(msg)
            | ApiError::Forbidden(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => msg,
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
