use axum::{Extension, Json, extract::Multipart};

use parley_types::api::{Claims, UploadResponse};
use parley_types::models::Attachment;

use crate::error::ApiError;

/// MIME allow-list for attachments.
pub const ALLOWED_MIME_TYPES: [&str; 2] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub fn is_allowed_type(mime: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime)
}

/// Validates an uploaded file and returns its metadata. The bytes are only
/// measured, never persisted — a real deployment hands them to an external
/// blob store and replaces this passthrough with a storage reference.
pub fn accept(name: &str, mime: &str, size: u64) -> Result<Attachment, ApiError> {
    if !is_allowed_type(mime) {
        return Err(ApiError::UnsupportedType(mime.to_string()));
    }
    Ok(Attachment {
        name: name.to_string(),
        kind: mime.to_string(),
        size,
    })
}

/// POST /upload — multipart with a `file` field.
pub async fn upload(
    Extension(_claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let mime = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("failed to read file: {e}")))?;

        let file = accept(&name, &mime, bytes.len() as u64)?;
        return Ok(Json(UploadResponse { file }));
    }

    Err(ApiError::Validation("no file provided".into()))
}
