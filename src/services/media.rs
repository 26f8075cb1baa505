//! Media files attached to wall posts.

use std::path::Path;

use axum::body::Bytes;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// File extensions accepted as post attachments.
pub const ALLOWED_MEDIA: [&str; 9] = ["png", "jpg", "jpeg", "gif", "webp", "mp4", "webm", "mp3", "ogg"];

/// An uploaded file, as read from a multipart field.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    /// The client-side file name. Only its extension is kept.
    pub file_name: String,
    /// The file contents.
    pub bytes: Bytes,
}

/// Returns the lowercased extension of `file_name` if it is allowed.
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    if stem.is_empty() || !ALLOWED_MEDIA.contains(&ext.as_str()) {
        return None;
    }
    Some(ext)
}

/// Writes `upload` into `media_dir` under a fresh name.
///
/// # Arguments
///
/// * `media_dir` - The directory media is served from.
/// * `upload` - The uploaded file.
///
/// # Returns
///
/// A `Result` containing the stored name, or `CouldNotPostMessage` if the
/// extension is not allowed or the file cannot be written.
pub async fn store_media(media_dir: &Path, upload: &MediaUpload) -> Result<String> {
    let ext = allowed_extension(&upload.file_name).ok_or_else(|| {
        tracing::warn!("❌ Rejected media upload: {}", upload.file_name);
        AppError::CouldNotPostMessage
    })?;

    let name = format!("{}.{}", Uuid::new_v4(), ext);

    tokio::fs::create_dir_all(media_dir).await.map_err(|e| {
        tracing::error!("❌ Could not create media directory: {}", e);
        AppError::CouldNotPostMessage
    })?;
    tokio::fs::write(media_dir.join(&name), &upload.bytes)
        .await
        .map_err(|e| {
            tracing::error!("❌ Could not write media {}: {}", name, e);
            AppError::CouldNotPostMessage
        })?;

    tracing::info!("📎 Stored media {} ({} bytes)", name, upload.bytes.len());
    Ok(name)
}
