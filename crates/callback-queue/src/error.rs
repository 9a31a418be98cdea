//! Error types for the queue

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::types::JobStatus;

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Queue errors
#[derive(Debug, Error)]
pub enum Error {
    /// Store not initialized, closed, or backing medium unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Job id does not exist
    #[error("Job not found: {0}")]
    NotFound(i64),

    /// Illegal status change requested
    #[error(
        "Invalid transition for job {id}: {} -> {requested}",
        .current.map(|s| s.as_str()).unwrap_or("unknown")
    )]
    InvalidTransition {
        id: i64,
        current: Option<JobStatus>,
        requested: JobStatus,
    },

    /// Submitted job failed shape or size validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a store unavailable error
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid transition error
    pub fn invalid_transition(id: i64, current: Option<JobStatus>, requested: JobStatus) -> Self {
        Self::InvalidTransition {
            id,
            current,
            requested,
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::StoreUnavailable(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable"),
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
            Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            Error::Json(_) => (StatusCode::BAD_REQUEST, "json_error"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error"),
            Error::Http(_) => (StatusCode::INTERNAL_SERVER_ERROR, "http_error"),
            Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message() {
        let err = Error::invalid_transition(7, Some(JobStatus::Completed), JobStatus::Failed);
        assert_eq!(err.to_string(), "Invalid transition for job 7: completed -> failed");

        let err = Error::invalid_transition(7, None, JobStatus::Processing);
        assert_eq!(err.to_string(), "Invalid transition for job 7: unknown -> processing");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::NotFound(1).into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::store_unavailable("closed").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            Error::internal("boom").into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
