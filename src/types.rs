// Request-level error taxonomy and its HTTP rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use crate::models::ErrorResponse;
use crate::storage::StorageError;

/// Errors that end a request before (or instead of) running the worker.
///
/// Worker and decode failures are not errors here; they are terminal
/// [`crate::extraction::ExtractionResult`] values.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Only {expected} files are allowed (got {got})")]
    InvalidType { expected: String, got: String },

    #[error("File size is too large. Max size is {} bytes", .limit)]
    SizeExceeded { limit: usize },

    #[error("No file uploaded")]
    NoFileProvided,

    #[error("Unexpected field: {0}")]
    UnexpectedField(String),

    #[error("Malformed upload: {0}")]
    MalformedUpload(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AppError {
    /// Machine-readable kind surfaced to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidType { .. } => "InvalidType",
            AppError::SizeExceeded { .. } => "SizeExceeded",
            AppError::NoFileProvided => "NoFileProvided",
            AppError::UnexpectedField(_) => "UnexpectedField",
            AppError::MalformedUpload(_) => "MalformedUpload",
            AppError::Storage(_) => "StorageError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidType { .. }
            | AppError::NoFileProvided
            | AppError::UnexpectedField(_)
            | AppError::MalformedUpload(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Upload failed: {}", self);
        }
        let body = ErrorResponse::new(self.to_string(), self.kind());
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;
