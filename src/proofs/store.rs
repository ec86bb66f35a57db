use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

pub const PHOTOS_DIR: &str = "photos";
pub const VIDEOS_DIR: &str = "videos";
pub const AUDIO_DIR: &str = "audio";
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Canonical URL of the shared thumbnail used for every audio proof.
pub const AUDIO_THUMBNAIL_URL: &str = "/uploads/thumbnails/audio_placeholder.png";

const AUDIO_PLACEHOLDER_FILE: &str = "audio_placeholder.png";

/// 1x1 transparent PNG seeded as the shared audio placeholder.
const AUDIO_PLACEHOLDER_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

/// Owns the on-disk layout for uploaded proof assets:
/// `<root>/{photos,videos,audio,thumbnails}/<name>`.
#[derive(Debug, Clone)]
pub struct ProofStore {
    root: PathBuf,
}

impl ProofStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("UPLOADS_DIR").unwrap_or_else(|_| "uploads".to_string());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Idempotent. Called once at startup, before the server takes traffic.
    /// Also seeds the shared audio placeholder so its canonical URL always
    /// resolves.
    pub async fn ensure_folders(&self) -> Result<(), ApiError> {
        for dir in [PHOTOS_DIR, VIDEOS_DIR, AUDIO_DIR, THUMBNAILS_DIR] {
            fs::create_dir_all(self.root.join(dir)).await.map_err(|e| {
                ApiError::Processing(format!("failed to create upload folder '{dir}': {e}"))
            })?;
        }

        let placeholder = self.root.join(THUMBNAILS_DIR).join(AUDIO_PLACEHOLDER_FILE);
        if !placeholder.exists() {
            fs::write(&placeholder, AUDIO_PLACEHOLDER_PNG)
                .await
                .map_err(|e| {
                    ApiError::Processing(format!("failed to seed the audio placeholder: {e}"))
                })?;
        }
        Ok(())
    }

    /// Photos is the fallback for anything that is not video or audio. The
    /// strict allow-list lives in the upload acceptance filter, not here.
    pub fn destination_for(content_type: &str) -> &'static str {
        if content_type.starts_with("video/") {
            VIDEOS_DIR
        } else if content_type.starts_with("audio/") {
            AUDIO_DIR
        } else {
            PHOTOS_DIR
        }
    }

    /// Collision-resistant name: millisecond timestamp plus a random
    /// suffix, original extension preserved.
    pub fn unique_name(original: &str) -> String {
        let ext = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}{}", Utc::now().timestamp_millis(), &suffix[..8], ext)
    }

    pub fn path_of(&self, folder: &str, file_name: &str) -> PathBuf {
        self.root.join(folder).join(file_name)
    }

    /// Public URL for a stored asset, as recorded in proof records.
    pub fn public_url(folder: &str, file_name: &str) -> String {
        format!("/uploads/{folder}/{file_name}")
    }

    /// Thumbnail naming convention: `thumb_<name>` for photos,
    /// `thumb_<name>.jpg` for videos. Audio shares the fixed placeholder,
    /// which is never deleted.
    pub fn thumbnail_name(folder: &str, file_name: &str) -> Option<String> {
        match folder {
            PHOTOS_DIR => Some(format!("thumb_{file_name}")),
            VIDEOS_DIR => Some(format!("thumb_{file_name}.jpg")),
            _ => None,
        }
    }

    /// Deletes the primary asset a canonical URL points at, plus the
    /// thumbnail the naming convention tracks for it. Returns false when
    /// the primary file is already gone; thumbnail removal is best-effort
    /// and never fails the delete.
    pub async fn delete(&self, url: &str) -> Result<bool, ApiError> {
        let (folder, file_name) = Self::locate(url)?;
        let primary = self.path_of(folder, file_name);
        match fs::remove_file(&primary).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(url, "delete requested for a file that is not on disk");
                return Ok(false);
            }
            Err(e) => {
                return Err(ApiError::Processing(format!(
                    "failed to delete '{url}': {e}"
                )))
            }
        }

        if let Some(thumb) = Self::thumbnail_name(folder, file_name) {
            let thumb_path = self.path_of(THUMBNAILS_DIR, &thumb);
            if let Err(e) = fs::remove_file(&thumb_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(url, error = %e, "failed to delete thumbnail");
                }
            }
        }
        Ok(true)
    }

    /// Maps a canonical URL back to its storage folder by the folder
    /// segment it carries.
    fn locate(url: &str) -> Result<(&'static str, &str), ApiError> {
        for folder in [PHOTOS_DIR, VIDEOS_DIR, AUDIO_DIR] {
            let marker = format!("/{folder}/");
            if let Some(idx) = url.find(&marker) {
                let file_name = &url[idx + marker.len()..];
                if !file_name.is_empty() && !file_name.contains('/') && !file_name.contains("..") {
                    return Ok((folder, file_name));
                }
            }
        }
        Err(ApiError::UnrecognizedAssetKind(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> ProofStore {
        ProofStore::new(std::env::temp_dir().join(format!("civicpulse-store-{}", Uuid::new_v4())))
    }

    #[test]
    fn unique_names_keep_the_extension_and_differ() {
        let a = ProofStore::unique_name("report.JPG");
        let b = ProofStore::unique_name("report.JPG");
        assert!(a.ends_with(".JPG"));
        assert_ne!(a, b);
        assert!(!ProofStore::unique_name("no_extension").contains('.'));
    }

    #[test]
    fn photos_is_the_fallback_destination() {
        assert_eq!(ProofStore::destination_for("video/mp4"), VIDEOS_DIR);
        assert_eq!(ProofStore::destination_for("audio/wav"), AUDIO_DIR);
        assert_eq!(ProofStore::destination_for("image/png"), PHOTOS_DIR);
        assert_eq!(ProofStore::destination_for("image/x-unknown"), PHOTOS_DIR);
        assert_eq!(
            ProofStore::destination_for("application/octet-stream"),
            PHOTOS_DIR
        );
    }

    #[test]
    fn thumbnail_names_follow_the_per_kind_convention() {
        assert_eq!(
            ProofStore::thumbnail_name(PHOTOS_DIR, "1-a.jpg").as_deref(),
            Some("thumb_1-a.jpg")
        );
        assert_eq!(
            ProofStore::thumbnail_name(VIDEOS_DIR, "1-a.mp4").as_deref(),
            Some("thumb_1-a.mp4.jpg")
        );
        assert_eq!(ProofStore::thumbnail_name(AUDIO_DIR, "1-a.mp3"), None);
    }

    #[tokio::test]
    async fn ensure_folders_is_idempotent() {
        let store = temp_store();
        store.ensure_folders().await.unwrap();
        store.ensure_folders().await.unwrap();
        for dir in [PHOTOS_DIR, VIDEOS_DIR, AUDIO_DIR, THUMBNAILS_DIR] {
            assert!(store.root().join(dir).is_dir());
        }
        assert!(store
            .root()
            .join(THUMBNAILS_DIR)
            .join(AUDIO_PLACEHOLDER_FILE)
            .is_file());
    }

    #[tokio::test]
    async fn delete_removes_primary_and_thumbnail() {
        let store = temp_store();
        store.ensure_folders().await.unwrap();
        let primary = store.path_of(PHOTOS_DIR, "1-abc.jpg");
        let thumb = store.path_of(THUMBNAILS_DIR, "thumb_1-abc.jpg");
        fs::write(&primary, b"jpeg").await.unwrap();
        fs::write(&thumb, b"jpeg").await.unwrap();

        let deleted = store.delete("/uploads/photos/1-abc.jpg").await.unwrap();
        assert!(deleted);
        assert!(!primary.exists());
        assert!(!thumb.exists());
    }

    #[tokio::test]
    async fn delete_survives_a_missing_thumbnail() {
        let store = temp_store();
        store.ensure_folders().await.unwrap();
        let primary = store.path_of(VIDEOS_DIR, "1-abc.mp4");
        fs::write(&primary, b"mp4").await.unwrap();

        let deleted = store.delete("/uploads/videos/1-abc.mp4").await.unwrap();
        assert!(deleted);
        assert!(!primary.exists());
    }

    #[tokio::test]
    async fn deleting_a_missing_file_is_false_not_an_error() {
        let store = temp_store();
        store.ensure_folders().await.unwrap();
        let deleted = store.delete("/uploads/photos/ghost.jpg").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn unrecognized_urls_are_an_error() {
        let store = temp_store();
        store.ensure_folders().await.unwrap();
        let err = store.delete("/uploads/documents/a.pdf").await.unwrap_err();
        assert!(matches!(err, ApiError::UnrecognizedAssetKind(_)));
        let err = store.delete("/uploads/photos/../escape.jpg").await;
        assert!(err.is_err());
    }
}
