use axum::extract::{Multipart, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use genre_domain::{ClassificationResponse, MediaKind};

use crate::error::ApiError;
use crate::AppState;

pub const MEDIA_FIELD: &str = "media_file";

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Welcome to the Media Genre Classifier API!" }))
}

struct Upload {
    filename: String,
    kind: MediaKind,
    bytes: Vec<u8>,
}

/// POST /v1/classify-media - classify an uploaded audio or video file (multipart/form-data)
pub async fn classify_media(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    info!(
        filename = %upload.filename,
        kind = ?upload.kind,
        bytes = upload.bytes.len(),
        "classifying upload"
    );

    let result = state
        .pool
        .classify(upload.kind, upload.bytes)
        .await
        .map_err(|err| {
            warn!(error = %err, "upload refused");
            ApiError::from(err)
        })?;
    Ok(Json(ClassificationResponse::new(upload.filename, result)))
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(MEDIA_FIELD) {
            debug!(name = ?field.name(), "skipping form field");
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let kind = field
            .content_type()
            .and_then(MediaKind::from_content_type)
            .ok_or(ApiError::UnsupportedMediaType)?;
        let bytes = field.bytes().await?;
        return Ok(Upload {
            filename,
            kind,
            bytes: bytes.to_vec(),
        });
    }
    Err(ApiError::MissingMediaFile)
}
