use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::parser::ParseError;
use crate::rag::RagError;
use crate::sql::approval::ApprovalError;
use crate::storage::StorageError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Error returned by route handlers, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, detail)
    }

    /// Log and wrap a provider failure as a 500.
    pub fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        error!("{context}: {err}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<ApprovalError> for ApiError {
    fn from(err: ApprovalError) -> Self {
        match err {
            ApprovalError::NotInitialized(_) => Self::unavailable(err.to_string()),
            ApprovalError::EmptyQuestion => Self::bad_request(err.to_string()),
            ApprovalError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            ApprovalError::Generation(_) => {
                error!("{err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidFilename(_) => Self::bad_request(err.to_string()),
            StorageError::Io(_) => Self::internal("Storage error", err),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Parse(ParseError::Extract(e)) => Self::bad_request(e.to_string()),
            RagError::Parse(e @ ParseError::Remote(_)) => Self::internal("Upload failed", e),
            RagError::Provider(e) => Self::internal("Upload failed", format!("{e:#}")),
        }
    }
}
