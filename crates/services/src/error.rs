use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use genre_classifier::PoolError;

/// Request-level failures. Pipeline failures never surface here; they are
/// ordinary 200 responses carrying the failure result.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unsupported file type. Please upload an audio or video file.")]
    UnsupportedMediaType,
    #[error("No media file provided. Upload it in the `media_file` field.")]
    MissingMediaFile,
    #[error("{message}")]
    Upload { status: StatusCode, message: String },
    #[error("The classifier is busy. Please retry shortly.")]
    Busy,
    #[error("The classifier is shutting down.")]
    Unavailable,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedMediaType | ApiError::MissingMediaFile => StatusCode::BAD_REQUEST,
            ApiError::Upload { status, .. } => *status,
            ApiError::Busy | ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Saturated => ApiError::Busy,
            PoolError::Closed => ApiError::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
