use axum::{
    extract::{Extension, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::proofs::{self, Proof, ProofProcessor, RawUpload};

/// Batch upload cap.
const MAX_BATCH_FILES: usize = 5;

async fn next_upload(multipart: &mut Multipart) -> Result<Option<RawUpload>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let Some(original_name) = file_name else {
            continue;
        };
        let content_type = content_type.unwrap_or_else(|| {
            mime_guess::from_path(&original_name)
                .first_or_octet_stream()
                .to_string()
        });
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        return Ok(Some(RawUpload {
            original_name,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn accept(upload: &RawUpload) -> Result<(), ApiError> {
    if let Err(e) = proofs::check_acceptable(upload) {
        crate::metrics::increment_uploads_rejected();
        return Err(e);
    }
    Ok(())
}

// POST /alerts/upload
pub async fn upload_proof(
    Extension(processor): Extension<ProofProcessor>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let Some(upload) = next_upload(&mut multipart).await? else {
        return Err(ApiError::Validation("no file attached".into()));
    };
    accept(&upload)?;

    let proof = processor.process(upload).await?;
    crate::metrics::increment_proofs_processed(proof.kind.as_str());

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "File processed", "data": proof })),
    )
        .into_response())
}

// POST /alerts/uploads
pub async fn upload_proofs(
    Extension(processor): Extension<ProofProcessor>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut processed: Vec<Proof> = Vec::new();

    while let Some(upload) = next_upload(&mut multipart).await? {
        if processed.len() == MAX_BATCH_FILES {
            return Err(ApiError::Validation(format!(
                "at most {MAX_BATCH_FILES} files per request"
            )));
        }
        accept(&upload)?;
        let proof = processor.process(upload).await?;
        crate::metrics::increment_proofs_processed(proof.kind.as_str());
        processed.push(proof);
    }

    if processed.is_empty() {
        return Err(ApiError::Validation("no file attached".into()));
    }

    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Files processed", "data": processed })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct DeleteUploadRequest {
    #[serde(alias = "fileUrl")]
    pub url: String,
}

// DELETE /alerts/upload
pub async fn delete_upload(
    Extension(processor): Extension<ProofProcessor>,
    Json(payload): Json<DeleteUploadRequest>,
) -> Result<Response, ApiError> {
    let deleted = processor.store().delete(&payload.url).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "data": { "deleted": deleted } })),
    )
        .into_response())
}
