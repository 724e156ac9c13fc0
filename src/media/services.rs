use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Kind of attachment; stored as the `media_type` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "media_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_content_type(ct: &str) -> Self {
        if ct.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A file pulled out of a multipart body, held in memory.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub url: String,
    pub kind: MediaKind,
}

/// Reads the next file field; `None` for empty parts.
pub async fn read_file(field: axum::extract::multipart::Field<'_>) -> ApiResult<Option<UploadItem>> {
    let content_type = field
        .content_type()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "application/octet-stream".into());
    let body = field.bytes().await?;
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(UploadItem { body, content_type }))
}

/// Pulls the single file named `name` out of a multipart body, ignoring the rest.
pub async fn single_file(mut mp: Multipart, name: &str) -> ApiResult<Option<UploadItem>> {
    while let Some(field) = mp.next_field().await? {
        if field.name() == Some(name) {
            return read_file(field).await;
        }
    }
    Ok(None)
}

/// Puts the bytes under `<root>/<folder>/<uuid>.<ext>` and returns where they live.
pub async fn upload_media(st: &AppState, folder: &str, item: UploadItem) -> ApiResult<StoredMedia> {
    let ext = ext_from_mime(&item.content_type).unwrap_or("bin");
    let key = format!(
        "{}/{}/{}.{}",
        st.config.storage.root_folder,
        folder,
        Uuid::new_v4(),
        ext
    );
    let kind = MediaKind::from_content_type(&item.content_type);

    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("put_object {}", key))
        .map_err(|e| ApiError::upstream("Media upload failed", e))?;

    info!(%key, ?kind, "media stored");
    Ok(StoredMedia {
        url: st.storage.public_url(&key),
        kind,
    })
}

/// Deletes the object behind `url` if this bucket owns it. Failures are logged only.
pub async fn remove_media(st: &AppState, url: &str) {
    let Some(key) = st.storage.key_for_url(url) else {
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "could not delete stored media");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}
