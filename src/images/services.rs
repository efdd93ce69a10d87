use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::AppError, storage::FileStore};

pub const USERS_FOLDER: &str = "users";
pub const PRODUCTS_FOLDER: &str = "products";

pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

/// One uploaded file as read from the request.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

pub fn validate(item: &UploadItem) -> Result<(), AppError> {
    if !ALLOWED_CONTENT_TYPES.contains(&item.content_type.as_str()) {
        warn!(content_type = %item.content_type, "rejected upload content type");
        return Err(AppError::validation(format!(
            "invalid file type: {}",
            item.content_type
        )));
    }
    Ok(())
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Extension of the client's file name, if it is short and alphanumeric.
fn ext_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ok = !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    ok.then(|| ext.to_ascii_lowercase())
}

/// Whether a client extension agrees with the declared content type.
fn ext_matches_mime(ext: &str, ct: &str) -> bool {
    match ct {
        "image/jpeg" | "image/jpg" => matches!(ext, "jpg" | "jpeg"),
        "image/png" => ext == "png",
        "image/gif" => ext == "gif",
        _ => false,
    }
}

/// Unguessable stored name: random UUID plus an extension. The original
/// extension is kept only when it matches the content type; the file is
/// served back from disk by extension.
pub fn generate_name(item: &UploadItem) -> String {
    let ext = item
        .file_name
        .as_deref()
        .and_then(ext_from_name)
        .filter(|ext| ext_matches_mime(ext, &item.content_type))
        .or_else(|| ext_from_mime(&item.content_type).map(str::to_string))
        .unwrap_or_else(|| "bin".to_string());
    format!("{}.{}", Uuid::new_v4(), ext)
}

/// Validates and stores an image, returning its public path.
pub async fn store_image(
    files: &dyn FileStore,
    folder: &str,
    item: UploadItem,
) -> Result<String, AppError> {
    validate(&item)?;
    let name = generate_name(&item);
    let path = files
        .save(folder, &name, item.body)
        .await
        .with_context(|| format!("store image {folder}/{name}"))?;
    debug!(%path, "image stored");
    Ok(path)
}

/// Best-effort removal; failures are logged and swallowed.
pub async fn discard_image(files: &dyn FileStore, path: &str) {
    if let Err(e) = files.delete(path).await {
        warn!(error = %e, %path, "failed to remove image file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalFileStore;

    fn item(ct: &str, name: Option<&str>) -> UploadItem {
        UploadItem {
            body: Bytes::from_static(b"img"),
            content_type: ct.into(),
            file_name: name.map(str::to_string),
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn keeps_original_extension() {
        let name = generate_name(&item("image/jpeg", Some("holiday.JPEG")));
        assert!(name.ends_with(".jpeg"));
        assert_eq!(name.len(), 36 + ".jpeg".len());
    }

    #[test]
    fn falls_back_to_mime_extension() {
        assert!(generate_name(&item("image/png", None)).ends_with(".png"));
        assert!(generate_name(&item("image/gif", Some("noext"))).ends_with(".gif"));
        assert!(generate_name(&item("image/png", Some("x.p/n g"))).ends_with(".png"));
    }

    #[test]
    fn mismatched_extension_uses_content_type() {
        assert!(generate_name(&item("image/png", Some("x.html"))).ends_with(".png"));
        assert!(generate_name(&item("image/gif", Some("x.svg"))).ends_with(".gif"));
        assert!(generate_name(&item("image/jpeg", Some("x.png"))).ends_with(".jpg"));
        assert!(generate_name(&item("image/jpeg", Some("x.jpg"))).ends_with(".jpg"));
    }

    #[test]
    fn names_do_not_repeat() {
        let i = item("image/png", Some("a.png"));
        assert_ne!(generate_name(&i), generate_name(&i));
    }

    #[test]
    fn validate_allow_list() {
        assert!(validate(&item("image/jpeg", None)).is_ok());
        assert!(validate(&item("image/png", None)).is_ok());
        assert!(validate(&item("image/gif", None)).is_ok());
        assert!(matches!(
            validate(&item("image/webp", None)),
            Err(AppError::Validation(_))
        ));
        assert!(validate(&item("text/plain", None)).is_err());
    }

    #[tokio::test]
    async fn store_then_discard() {
        let dir = tempfile::tempdir().unwrap();
        let files = LocalFileStore::new(dir.path());

        let path = store_image(&files, PRODUCTS_FOLDER, item("image/png", Some("p.png")))
            .await
            .unwrap();
        assert!(path.starts_with("/uploads/products/"));
        assert!(files.exists(&path).await.unwrap());

        discard_image(&files, &path).await;
        assert!(!files.exists(&path).await.unwrap());
        // second removal is silent
        discard_image(&files, &path).await;
    }
}
