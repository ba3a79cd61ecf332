/// Unified error types for the portfolio CMS
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the CMS
#[derive(Error, Debug)]
pub enum CmsError {
    /// Database errors that are not otherwise classified
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The store could not be reached (pool exhausted, closed, I/O failure)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed input, empty tag names, invalid ids
    #[error("Validation error: {0}")]
    Validation(String),

    /// Owner or tag lookup miss
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate unique value on an explicit create
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Local or remote upload storage failure
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for CmsError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CmsError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                CmsError::StoreUnavailable(err.to_string())
            }
            sqlx::Error::Io(e) => CmsError::StoreUnavailable(e.to_string()),
            other if is_lock_contention(&other) => CmsError::StoreUnavailable(other.to_string()),
            other => CmsError::Database(other),
        }
    }
}

impl CmsError {
    /// Map a unique-constraint violation to `Conflict`, passing every other error through
    pub fn on_unique_violation(err: sqlx::Error, message: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            CmsError::Conflict(message.into())
        } else {
            err.into()
        }
    }
}

/// True when the error is a uniqueness (or primary key) constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// True when SQLite gave up waiting for a lock (SQLITE_BUSY or SQLITE_LOCKED,
/// including their extended codes)
pub fn is_lock_contention(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        .map(|code| matches!(code & 0xff, 5 | 6))
        .unwrap_or(false)
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert CmsError to HTTP response
impl IntoResponse for CmsError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            CmsError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "InvalidRequest",
                self.to_string(),
            ),
            CmsError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound", self.to_string()),
            CmsError::Conflict(_) => (StatusCode::CONFLICT, "Conflict", self.to_string()),
            CmsError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "StoreUnavailable",
                "Data store is unavailable".to_string(),
            ),
            CmsError::Upload(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "UploadFailure",
                self.to_string(),
            ),
            CmsError::Database(_) | CmsError::Internal(_) | CmsError::Io(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for CMS operations
pub type CmsResult<T> = Result<T, CmsError>;
