use axum::extract::Multipart;
use tracing::warn;

use super::services::UploadItem;
use crate::error::AppError;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// Reads the `image` field from a multipart body; other fields are skipped.
pub async fn read_image(mut mp: Multipart) -> Result<UploadItem, AppError> {
    while let Some(field) = mp.next_field().await.map_err(|e| {
        warn!(error = %e, "malformed multipart body");
        AppError::validation("malformed multipart body")
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        let file_name = field.file_name().map(|s| s.to_string());
        let body = field
            .bytes()
            .await
            .map_err(|_| AppError::validation("failed to read uploaded file"))?;
        return Ok(UploadItem {
            body,
            content_type,
            file_name,
        });
    }
    Err(AppError::validation("no file uploaded"))
}
