//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use qto_common::QtoError;
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Qto(#[from] QtoError),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message.clone()),
            AppError::Qto(err) => status_for(err),
            AppError::Internal(message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Map the shared error taxonomy onto HTTP status codes.
///
/// Gateway rejections are client errors, translation-service failures are
/// upstream errors, and an undecodable result payload is reported as 422 so
/// callers can tell it apart from a translation failure.
fn status_for(err: &QtoError) -> (StatusCode, String) {
    match err {
        QtoError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        QtoError::PayloadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        QtoError::UploadFailed(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        QtoError::TranslationError(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        QtoError::PollTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        QtoError::ExtractionDataError(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        QtoError::Database(message) => {
            tracing::error!("Database error: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "A database error occurred".to_string(),
            )
        },
        _ => {
            tracing::error!("Unhandled error: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
            )
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_rejections_are_client_errors() {
        let (status, _) = status_for(&QtoError::InvalidFormat("exe".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = status_for(&QtoError::PayloadTooLarge {
            size_bytes: 2,
            limit_bytes: 1,
        });
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_extraction_error_is_distinct_from_translation_error() {
        let (extraction, _) = status_for(&QtoError::ExtractionDataError("bad".to_string()));
        let (translation, _) = status_for(&QtoError::TranslationError("bad".to_string()));
        assert_ne!(extraction, translation);
        assert_eq!(extraction, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(translation, StatusCode::BAD_GATEWAY);
    }
}
