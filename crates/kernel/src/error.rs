//! Application error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::file::UploadRejection;
use crate::store::StoreError;

/// Errors raised by the content layer (context, editor, media library).
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("failed to save")]
    StoreWrite(#[source] StoreError),

    #[error("upload failed")]
    Upload(#[source] anyhow::Error),

    #[error(transparent)]
    InvalidUpload(#[from] UploadRejection),

    #[error("upload cancelled")]
    UploadCancelled,

    /// The object was stored but its library record was not written.
    #[error("uploaded to {url} but the media record could not be saved")]
    MetadataWrite {
        url: String,
        #[source]
        source: StoreError,
    },

    #[error("store error")]
    Store(#[from] StoreError),
}

/// Result type alias using ContentError.
pub type ContentResult<T> = Result<T, ContentError>;

/// HTTP-facing errors. Every variant renders as JSON `{ "error": ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("verification failed")]
    Verification,

    #[error("{0}")]
    ServerMisconfigured(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Bad request without a specific field.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::validation("request", message)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Verification => StatusCode::FORBIDDEN,
            AppError::ServerMisconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::Content(e) => match e {
                ContentError::Validation(_) => StatusCode::BAD_REQUEST,
                ContentError::NotFound | ContentError::Store(StoreError::NotFound) => {
                    StatusCode::NOT_FOUND
                }
                ContentError::InvalidUpload(UploadRejection::TooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                ContentError::InvalidUpload(UploadRejection::Empty) => StatusCode::BAD_REQUEST,
                ContentError::InvalidUpload(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ContentError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Content(ContentError::Store(e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // 5xx details go to the log; the client gets a generic message.
        // ServerMisconfigured is meant for the operator and passes through.
        let message = match &self {
            AppError::ServerMisconfigured(msg) => {
                tracing::error!(error = %msg, "server misconfigured");
                msg.clone()
            }
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal server error");
                "internal server error".to_string()
            }
            AppError::Content(ContentError::MetadataWrite { url, source }) => {
                tracing::error!(error = %source, url = %url, "media record write failed");
                self.to_string()
            }
            AppError::Content(e) if status.is_server_error() => {
                tracing::error!(error = ?e, "content error");
                e.to_string()
            }
            _ => self.to_string(),
        };

        let body = match &self {
            AppError::Validation { field, .. } => json!({ "error": message, "field": field }),
            // The object is already stored; hand back its URL.
            AppError::Content(ContentError::MetadataWrite { url, .. }) => {
                json!({ "error": message, "url": url })
            }
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            AppError::validation("email", "bad").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Verification.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::ServerMisconfigured("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(StoreError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(ContentError::InvalidUpload(UploadRejection::TooLarge {
                size: 20,
                max: 10
            }))
            .status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::from(ContentError::UploadCancelled).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn verification_message_is_generic() {
        assert_eq!(AppError::Verification.to_string(), "verification failed");
    }
}
