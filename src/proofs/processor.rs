use std::io::Write;
use std::path::Path;

use axum::body::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use tokio::fs;
use tokio::process::Command;
use tracing::{info, warn};

use super::store::{ProofStore, AUDIO_THUMBNAIL_URL, THUMBNAILS_DIR};
use super::{MediaKind, Proof};
use crate::error::ApiError;

/// Bounding box for photo thumbnails.
const THUMBNAIL_MAX: u32 = 300;
const THUMBNAIL_JPEG_QUALITY: u8 = 80;
/// Bounding box for the optimized primary photo asset. Never upscales.
const OPTIMIZED_MAX: u32 = 1200;
const OPTIMIZED_JPEG_QUALITY: u8 = 85;
/// Size of the representative frame pulled out of uploaded videos.
const VIDEO_FRAME_SIZE: &str = "320x240";

/// A file as it arrives from the multipart layer, acceptance-checked but
/// not yet stored.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// Turns one uploaded file into a normalized proof record. The media
/// family is decided once, from the declared content type; each family
/// then runs its own post-processing.
#[derive(Debug, Clone)]
pub struct ProofProcessor {
    store: ProofStore,
}

impl ProofProcessor {
    pub fn new(store: ProofStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ProofStore {
        &self.store
    }

    pub async fn process(&self, upload: RawUpload) -> Result<Proof, ApiError> {
        let kind = MediaKind::from_mime(&upload.content_type)?;
        let folder = ProofStore::destination_for(&upload.content_type);
        let file_name = ProofStore::unique_name(&upload.original_name);
        let path = self.store.path_of(folder, &file_name);

        fs::write(&path, &upload.data).await.map_err(|e| {
            ApiError::Processing(format!("failed to store '{}': {e}", upload.original_name))
        })?;

        let thumbnail = match kind {
            MediaKind::Image => Some(self.process_image(&path, &file_name).await?),
            MediaKind::Video => self.extract_video_frame(&path, &file_name).await,
            MediaKind::Audio => Some(AUDIO_THUMBNAIL_URL.to_string()),
        };

        let size = fs::metadata(&path)
            .await
            .map(|m| m.len())
            .unwrap_or(upload.data.len() as u64);

        info!(file = %file_name, kind = ?kind, size, "proof processed");
        Ok(Proof {
            kind: kind.proof_kind(),
            url: ProofStore::public_url(folder, &file_name),
            thumbnail,
            size,
        })
    }

    /// Writes a bounded thumbnail and re-encodes the primary asset in
    /// place through a temp-file-then-rename swap, so a concurrent reader
    /// never observes a half-written file. Encoding failure fails the
    /// proof.
    async fn process_image(&self, path: &Path, file_name: &str) -> Result<String, ApiError> {
        let thumb_name = format!("thumb_{file_name}");
        let thumb_path = self.store.path_of(THUMBNAILS_DIR, &thumb_name);
        let primary = path.to_path_buf();
        let tmp = path.with_file_name(format!("{file_name}.tmp"));

        let encoded = tokio::task::spawn_blocking(move || -> image::ImageResult<()> {
            let img = image::open(&primary)?;

            let thumb = img.thumbnail(THUMBNAIL_MAX, THUMBNAIL_MAX);
            write_jpeg(&thumb, &thumb_path, THUMBNAIL_JPEG_QUALITY)?;

            let optimized = if img.width() > OPTIMIZED_MAX || img.height() > OPTIMIZED_MAX {
                img.thumbnail(OPTIMIZED_MAX, OPTIMIZED_MAX)
            } else {
                img
            };
            write_jpeg(&optimized, &tmp, OPTIMIZED_JPEG_QUALITY)?;
            std::fs::rename(&tmp, &primary)?;
            Ok(())
        })
        .await;

        match encoded {
            Ok(Ok(())) => Ok(ProofStore::public_url(THUMBNAILS_DIR, &thumb_name)),
            Ok(Err(e)) => Err(ApiError::Processing(format!(
                "image encoding failed for '{file_name}': {e}"
            ))),
            Err(e) => Err(ApiError::Processing(format!(
                "image task failed for '{file_name}': {e}"
            ))),
        }
    }

    /// Pulls one representative frame as the thumbnail. Failure here never
    /// fails the proof: the primary asset is already stored, so the record
    /// degrades to `thumbnail: None`.
    async fn extract_video_frame(&self, path: &Path, file_name: &str) -> Option<String> {
        let thumb_name = format!("thumb_{file_name}.jpg");
        let thumb_path = self.store.path_of(THUMBNAILS_DIR, &thumb_name);

        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(path)
            .args(["-ss", "00:00:01", "-frames:v", "1", "-s", VIDEO_FRAME_SIZE])
            .arg(&thumb_path)
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                Some(ProofStore::public_url(THUMBNAILS_DIR, &thumb_name))
            }
            Ok(out) => {
                warn!(
                    file = %file_name,
                    status = ?out.status.code(),
                    "video frame extraction failed, keeping proof without thumbnail"
                );
                None
            }
            Err(e) => {
                warn!(
                    file = %file_name,
                    error = %e,
                    "could not run ffmpeg, keeping proof without thumbnail"
                );
                None
            }
        }
    }
}

fn write_jpeg(img: &image::DynamicImage, path: &Path, quality: u8) -> image::ImageResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    encoder.encode_image(&img.to_rgb8())?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proofs::ProofKind;
    use std::io::Cursor;
    use uuid::Uuid;

    fn temp_processor() -> ProofProcessor {
        ProofProcessor::new(ProofStore::new(
            std::env::temp_dir().join(format!("civicpulse-proc-{}", Uuid::new_v4())),
        ))
    }

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([120u8, 10, 200]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buf)
    }

    #[tokio::test]
    async fn image_uploads_get_a_thumbnail_and_a_reencoded_primary() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let proof = processor
            .process(RawUpload {
                original_name: "evidence.png".to_string(),
                content_type: "image/png".to_string(),
                data: png_bytes(640, 480),
            })
            .await
            .unwrap();

        assert_eq!(proof.kind, ProofKind::Photo);
        assert!(proof.url.starts_with("/uploads/photos/"));
        assert!(proof.size > 0);

        let file_name = proof.url.rsplit('/').next().unwrap();
        let primary = processor.store().path_of("photos", file_name);
        assert!(primary.exists());

        let thumb_url = proof.thumbnail.expect("photo proofs carry a thumbnail");
        assert_eq!(
            thumb_url,
            format!("/uploads/thumbnails/thumb_{file_name}")
        );
        let thumb_path = processor
            .store()
            .path_of(THUMBNAILS_DIR, &format!("thumb_{file_name}"));
        let thumb = image::open(thumb_path).unwrap();
        assert!(thumb.width() <= THUMBNAIL_MAX && thumb.height() <= THUMBNAIL_MAX);
    }

    #[tokio::test]
    async fn small_images_are_not_upscaled() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let proof = processor
            .process(RawUpload {
                original_name: "small.png".to_string(),
                content_type: "image/png".to_string(),
                data: png_bytes(64, 48),
            })
            .await
            .unwrap();

        let file_name = proof.url.rsplit('/').next().unwrap();
        let primary = image::open(processor.store().path_of("photos", file_name)).unwrap();
        assert_eq!((primary.width(), primary.height()), (64, 48));
    }

    #[tokio::test]
    async fn corrupt_images_fail_with_processing_error() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let err = processor
            .process(RawUpload {
                original_name: "broken.png".to_string(),
                content_type: "image/png".to_string(),
                data: Bytes::from_static(b"not actually a png"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Processing(_)));
    }

    #[tokio::test]
    async fn failed_frame_extraction_degrades_instead_of_failing() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let proof = processor
            .process(RawUpload {
                original_name: "clip.mp4".to_string(),
                content_type: "video/mp4".to_string(),
                data: Bytes::from_static(b"not a real mp4 stream"),
            })
            .await
            .unwrap();

        assert_eq!(proof.kind, ProofKind::Video);
        assert!(proof.thumbnail.is_none());
        assert!(proof.url.starts_with("/uploads/videos/"));
        let file_name = proof.url.rsplit('/').next().unwrap();
        assert!(processor.store().path_of("videos", file_name).exists());
    }

    #[tokio::test]
    async fn audio_uploads_share_the_placeholder_thumbnail() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let proof = processor
            .process(RawUpload {
                original_name: "note.mp3".to_string(),
                content_type: "audio/mpeg".to_string(),
                data: Bytes::from_static(b"id3 payload"),
            })
            .await
            .unwrap();

        assert_eq!(proof.kind, ProofKind::Audio);
        assert_eq!(proof.thumbnail.as_deref(), Some(AUDIO_THUMBNAIL_URL));
        assert!(proof.url.starts_with("/uploads/audio/"));
    }

    #[tokio::test]
    async fn unsupported_content_types_are_refused() {
        let processor = temp_processor();
        processor.store().ensure_folders().await.unwrap();

        let err = processor
            .process(RawUpload {
                original_name: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                data: Bytes::from_static(b"hello"),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedMedia(_)));
    }
}
