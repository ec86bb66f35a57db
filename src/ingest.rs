use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::entities::alert;
use crate::error::ApiError;
use crate::geo::GeoPoint;
use crate::proofs::{Proof, ProofProcessor, RawUpload};

/// Initial lifecycle state for every alert.
pub const INITIAL_STATUS: &str = "pending";

/// Processing budget granted per uploaded file; the whole batch shares the
/// summed budget and fails as a processing error when it runs out.
const PER_FILE_TIMEOUT_SECS: u64 = 30;

/// Fields of an alert creation request, before validation. Collected from
/// either the JSON body or the multipart form fields; the owning citizen
/// comes from the authenticated principal, never from here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDraft {
    pub service_id: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub coordinates: Option<serde_json::Value>,
    pub address: Option<String>,
    pub is_anonymous: Option<serde_json::Value>,
    pub proofs: Option<Vec<Proof>>,
}

/// Validates a draft, processes any uploaded files, and persists the
/// alert. Nothing is persisted unless every upload processed successfully
/// (a degraded video thumbnail still counts as success).
pub async fn create_alert(
    db: &DatabaseConnection,
    processor: &ProofProcessor,
    draft: AlertDraft,
    uploads: Vec<RawUpload>,
    citizen_id: &str,
) -> Result<alert::Model, ApiError> {
    let location = match draft.coordinates {
        Some(ref value) => GeoPoint::from_request_value(value)?,
        None => return Err(ApiError::Validation("coordinates are required".into())),
    };
    let is_anonymous = parse_is_anonymous(draft.is_anonymous.as_ref())?;
    let proofs = resolve_proofs(processor, uploads, draft.proofs).await?;
    let proof_count = proofs.len();

    let now = Utc::now().naive_utc();
    let new_alert = alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        service_id: Set(draft.service_id),
        category: Set(draft.category),
        title: Set(draft.title),
        description: Set(draft.description),
        priority: Set(draft.priority),
        location: Set(location.to_json()),
        address: Set(draft.address),
        is_anonymous: Set(is_anonymous),
        citizen_id: Set(Some(citizen_id.to_string())),
        proofs: Set(serde_json::to_value(&proofs)
            .map_err(|e| ApiError::Processing(format!("failed to encode proofs: {e}")))?),
        status: Set(INITIAL_STATUS.to_string()),
        comments: Set(json!([])),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let stored = new_alert.insert(db).await?;
    info!(alert_id = %stored.id, proofs = proof_count, "alert created");
    Ok(stored)
}

/// Accepts a boolean or the literal strings "true"/"false". Absent means
/// not anonymous.
pub fn parse_is_anonymous(value: Option<&serde_json::Value>) -> Result<bool, ApiError> {
    match value {
        None => Ok(false),
        Some(serde_json::Value::Bool(b)) => Ok(*b),
        Some(serde_json::Value::String(s)) => match s.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ApiError::Validation(format!(
                "isAnonymous must be a boolean, got '{other}'"
            ))),
        },
        Some(other) => Err(ApiError::Validation(format!(
            "isAnonymous must be a boolean, got {other}"
        ))),
    }
}

/// Proof source resolution: uploaded files win and discard any inline
/// proofs; inline proofs are trusted verbatim; no evidence at all is
/// allowed.
async fn resolve_proofs(
    processor: &ProofProcessor,
    uploads: Vec<RawUpload>,
    inline: Option<Vec<Proof>>,
) -> Result<Vec<Proof>, ApiError> {
    if !uploads.is_empty() {
        let budget = std::time::Duration::from_secs(PER_FILE_TIMEOUT_SECS * uploads.len() as u64);
        let proofs = tokio::time::timeout(budget, async {
            let mut proofs = Vec::with_capacity(uploads.len());
            for upload in uploads {
                proofs.push(processor.process(upload).await?);
            }
            Ok::<_, ApiError>(proofs)
        })
        .await
        .map_err(|_| ApiError::Processing("proof processing timed out".into()))??;
        return Ok(proofs);
    }
    Ok(inline.unwrap_or_default())
}
