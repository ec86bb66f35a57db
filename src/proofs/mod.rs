pub mod processor;
pub mod store;

pub use processor::{ProofProcessor, RawUpload};
pub use store::ProofStore;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Per-file size cap enforced by the upload acceptance filter.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Exact content types the upload endpoints accept. Anything else is
/// rejected before it reaches processing. Kind routing below is looser on
/// purpose (photos is the fallback folder); this list is the strict gate.
pub const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/x-msvideo",
    "video/webm",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/webm",
];

pub fn is_accepted_mime(content_type: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&content_type)
}

/// Upload acceptance filter: exact content-type allow-list plus the
/// per-file size cap.
pub fn check_acceptable(upload: &RawUpload) -> Result<(), ApiError> {
    if !is_accepted_mime(&upload.content_type) {
        return Err(ApiError::UnsupportedMedia(upload.content_type.clone()));
    }
    if upload.data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation(format!(
            "file '{}' exceeds the {} MB limit",
            upload.original_name,
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    Photo,
    Video,
    Audio,
}

impl ProofKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofKind::Photo => "photo",
            ProofKind::Video => "video",
            ProofKind::Audio => "audio",
        }
    }
}

/// One piece of evidence attached to an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub kind: ProofKind,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Media family of an upload, decided once at the boundary from the
/// declared content type. Each family carries its own processing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn from_mime(content_type: &str) -> Result<Self, ApiError> {
        match content_type.split('/').next().unwrap_or_default() {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            _ => Err(ApiError::UnsupportedMedia(content_type.to_string())),
        }
    }

    pub fn proof_kind(&self) -> ProofKind {
        match self {
            MediaKind::Image => ProofKind::Photo,
            MediaKind::Video => ProofKind::Video,
            MediaKind::Audio => ProofKind::Audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn upload(name: &str, content_type: &str, len: usize) -> RawUpload {
        RawUpload {
            original_name: name.to_string(),
            content_type: content_type.to_string(),
            data: Bytes::from(vec![0u8; len]),
        }
    }

    #[test]
    fn acceptance_list_is_exact() {
        assert!(is_accepted_mime("image/jpeg"));
        assert!(is_accepted_mime("video/quicktime"));
        assert!(is_accepted_mime("audio/ogg"));
        assert!(!is_accepted_mime("image/tiff"));
        assert!(!is_accepted_mime("application/pdf"));
        assert!(!is_accepted_mime("image/jpeg; charset=utf-8"));
    }

    #[test]
    fn oversized_uploads_are_rejected() {
        let ok = upload("a.png", "image/png", 16);
        assert!(check_acceptable(&ok).is_ok());
        let too_big = upload("a.png", "image/png", MAX_UPLOAD_BYTES + 1);
        assert!(matches!(
            check_acceptable(&too_big),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn unsupported_types_are_rejected_before_processing() {
        let pdf = upload("doc.pdf", "application/pdf", 16);
        assert!(matches!(
            check_acceptable(&pdf),
            Err(ApiError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn media_kind_dispatches_on_the_type_family() {
        assert_eq!(MediaKind::from_mime("image/png").unwrap(), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("video/mp4").unwrap(), MediaKind::Video);
        assert_eq!(
            MediaKind::from_mime("audio/mpeg").unwrap(),
            MediaKind::Audio
        );
        assert!(matches!(
            MediaKind::from_mime("text/plain"),
            Err(ApiError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn proof_serializes_with_a_type_tag() {
        let proof = Proof {
            kind: ProofKind::Photo,
            url: "/uploads/photos/1-a.jpg".into(),
            thumbnail: Some("/uploads/thumbnails/thumb_1-a.jpg".into()),
            size: 1234,
        };
        let value = serde_json::to_value(&proof).unwrap();
        assert_eq!(value["type"], "photo");
        assert_eq!(value["size"], 1234);
    }
}
