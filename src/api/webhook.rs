use axum::{
    extract::{Extension, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::alerts::AlertView;
use crate::entities::alert;
use crate::error::ApiError;

pub const SERVICE_KEY_HEADER: &str = "x-service-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub alert_id: Option<String>,
    pub status: Option<String>,
    pub comment: Option<String>,
    pub updated_by: Option<String>,
}

/// Service-to-service trust: a static shared secret, distinct from
/// citizen auth. An unset secret rejects every caller.
pub fn verify_service_key(provided: Option<&str>, expected: &str) -> Result<(), ApiError> {
    match provided {
        Some(key) if !expected.is_empty() && key == expected => Ok(()),
        _ => Err(ApiError::Unauthorized("invalid service key".into())),
    }
}

// POST /alerts/webhook/status
pub async fn update_status(
    Extension(db): Extension<DatabaseConnection>,
    request: Request,
) -> Result<Response, ApiError> {
    // Key check runs before the body is even parsed: a bad caller gets 401
    // no matter what the payload looks like.
    let expected = std::env::var("SERVICE_WEBHOOK_KEY").unwrap_or_default();
    let provided = request
        .headers()
        .get(SERVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    verify_service_key(provided, &expected)?;

    let Json(payload) = Json::<StatusUpdateRequest>::from_request(request, &())
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?;

    let alert_id = payload
        .alert_id
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation("alertId is required".into()))?;
    let status = payload
        .status
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation("status is required".into()))?;
    let alert_id = Uuid::parse_str(alert_id)
        .map_err(|_| ApiError::Validation("alertId is not a valid id".into()))?;

    let alert = alert::Entity::find_by_id(alert_id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert not found".into()))?;

    let previous = alert.status.clone();
    let mut comments = alert.comments.as_array().cloned().unwrap_or_default();
    if let Some(note) = payload.comment.as_deref().filter(|c| !c.trim().is_empty()) {
        comments.push(json!({
            "citizen_id": payload.updated_by.clone().unwrap_or_else(|| "service".to_string()),
            "text": note,
            "created_at": Utc::now().naive_utc(),
        }));
    }

    let mut active: alert::ActiveModel = alert.into();
    active.status = Set(status.to_string());
    active.comments = Set(serde_json::Value::Array(comments));
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&db).await?;

    crate::metrics::increment_status_transitions(&updated.status);
    info!(alert_id = %updated.id, from = %previous, to = %updated.status, "alert status updated");

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Status updated",
            "data": AlertView::for_viewer(updated, None),
        })),
    )
        .into_response())
}
