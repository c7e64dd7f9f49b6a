//! API error envelope.
//!
//! Every failure leaves the server as `{"kind": ..., "message": ...}` with a
//! status derived from the [`AppError`] variant.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, RenderKind, ValidationKind};

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error kind, e.g. `file_too_large`.
    pub kind: String,
    /// Human-readable error message.
    pub message: String,
}

/// Error returned by every handler.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.kind
    }
}

const fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation { .. }
        | AppError::Render {
            kind: RenderKind::UnknownFormat,
            ..
        } => StatusCode::BAD_REQUEST,
        AppError::NotFound { .. }
        | AppError::Render {
            kind: RenderKind::EmptyConversation,
            ..
        } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = status_for(&err);
        if status.is_server_error() {
            tracing::error!(kind = err.kind(), error = %err, "Request failed");
        }
        Self {
            status,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(
            ValidationKind::InvalidRequest,
            format!("Invalid JSON body: {}", rejection.body_text()),
        )
        .into()
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::validation(
            ValidationKind::InvalidRequest,
            format!("Expected a multipart upload: {}", rejection.body_text()),
        )
        .into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(
            ValidationKind::InvalidRequest,
            format!("Invalid query string: {}", rejection.body_text()),
        )
        .into()
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let kind = if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ValidationKind::FileTooLarge
        } else {
            ValidationKind::InvalidRequest
        };
        AppError::validation(kind, format!("Malformed upload: {}", err.body_text())).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            kind: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
