use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use super::dto::UploadResponse;
use crate::{
    error::{AppError, FieldError},
    storage::StorageClient,
};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const UPLOAD_PREFIX: &str = "uploads/";

/// Supported image types and the extension their objects get.
fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Pull the `file` field out of a multipart form.
pub async fn read_file_field(mp: &mut Multipart) -> Result<UploadItem, AppError> {
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(UploadItem { body, content_type });
    }
    Err(AppError::Validation(vec![FieldError::new(
        "file",
        "is required",
    )]))
}

pub async fn store_image(
    storage: &dyn StorageClient,
    item: UploadItem,
) -> Result<UploadResponse, AppError> {
    let ext = ext_from_mime(&item.content_type).ok_or_else(|| {
        AppError::BadRequest("Only JPEG, PNG and WebP images are accepted".into())
    })?;
    if item.body.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    if item.body.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest("Image must be at most 5 MB".into()));
    }

    let key = format!("{}{}.{}", UPLOAD_PREFIX, Uuid::new_v4(), ext);
    let size = item.body.len();
    storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    info!(%key, size, "image uploaded");

    Ok(UploadResponse {
        url: storage.public_url(&key),
        key,
    })
}

/// Remove an object previously returned by [`store_image`]. `name` is the
/// part of the key after the upload prefix.
pub async fn remove_image(storage: &dyn StorageClient, name: &str) -> Result<(), AppError> {
    let valid = name
        .rsplit_once('.')
        .and_then(|(stem, ext)| Some((Uuid::parse_str(stem).ok()?, ext)))
        .is_some_and(|(_, ext)| matches!(ext, "jpg" | "png" | "webp"));
    if !valid {
        return Err(AppError::NotFound("Upload"));
    }

    let key = format!("{}{}", UPLOAD_PREFIX, name);
    storage
        .delete_object(&key)
        .await
        .with_context(|| format!("delete_object {}", key))?;
    info!(%key, "image deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn ext_from_mime_accepts_only_web_images() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/heic"), None);
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn stores_under_upload_prefix() {
        let state = AppState::fake();
        let out = store_image(
            state.storage.as_ref(),
            UploadItem {
                body: Bytes::from_static(b"\x89PNG...."),
                content_type: "image/png".into(),
            },
        )
        .await
        .unwrap();
        assert!(out.key.starts_with(UPLOAD_PREFIX));
        assert!(out.key.ends_with(".png"));
        assert_eq!(out.url, format!("https://fake.local/{}", out.key));
    }

    #[tokio::test]
    async fn rejects_wrong_type_and_oversized_files() {
        let state = AppState::fake();
        let err = store_image(
            state.storage.as_ref(),
            UploadItem {
                body: Bytes::from_static(b"%PDF"),
                content_type: "application/pdf".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = store_image(
            state.storage.as_ref(),
            UploadItem {
                body: Bytes::from(vec![0u8; MAX_UPLOAD_BYTES + 1]),
                content_type: "image/jpeg".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn remove_only_accepts_generated_names() {
        let state = AppState::fake();
        let name = format!("{}.webp", Uuid::new_v4());
        assert!(remove_image(state.storage.as_ref(), &name).await.is_ok());

        let err = remove_image(state.storage.as_ref(), "../secrets.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Upload")));
    }
}
