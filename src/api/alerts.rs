use axum::{
    extract::{Extension, FromRequest, Multipart, Path, Query, Request},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::middleware::Citizen;
use crate::entities::alert;
use crate::error::ApiError;
use crate::geo::{GeoPoint, DEFAULT_NEARBY_DISTANCE_METERS};
use crate::ingest::{self, AlertDraft};
use crate::proofs::{self, ProofProcessor, RawUpload};
use crate::{notifier, queries};

/// Alert as returned to citizens. Anonymous alerts hide the author from
/// everyone but the author.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertView {
    pub id: Uuid,
    pub service_id: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub location: serde_json::Value,
    pub address: Option<String>,
    pub is_anonymous: bool,
    pub citizen_id: Option<String>,
    pub proofs: serde_json::Value,
    pub status: String,
    pub comments: serde_json::Value,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl AlertView {
    pub fn for_viewer(alert: alert::Model, viewer: Option<&str>) -> Self {
        let is_owner = matches!(
            (&alert.citizen_id, viewer),
            (Some(owner), Some(v)) if owner == v
        );
        let citizen_id = if alert.is_anonymous && !is_owner {
            None
        } else {
            alert.citizen_id
        };
        Self {
            id: alert.id,
            service_id: alert.service_id,
            category: alert.category,
            title: alert.title,
            description: alert.description,
            priority: alert.priority,
            location: alert.location,
            address: alert.address,
            is_anonymous: alert.is_anonymous,
            citizen_id,
            proofs: alert.proofs,
            status: alert.status,
            comments: alert.comments,
            created_at: alert.created_at,
            updated_at: alert.updated_at,
        }
    }
}

// POST /alerts
pub async fn create_alert(
    Extension(db): Extension<DatabaseConnection>,
    Extension(processor): Extension<ProofProcessor>,
    Extension(citizen): Extension<Citizen>,
    request: Request,
) -> Result<Response, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let (draft, uploads) = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        collect_draft(multipart).await?
    } else {
        let Json(draft) = Json::<AlertDraft>::from_request(request, &())
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        (draft, Vec::new())
    };

    let alert = ingest::create_alert(&db, &processor, draft, uploads, &citizen.id).await?;

    crate::metrics::increment_alerts_created(alert.category.as_deref().unwrap_or("uncategorized"));
    tracing::Span::current()
        .record("action", "create_alert")
        .record("citizen_id", citizen.id.as_str())
        .record("alert_id", tracing::field::display(alert.id))
        .record("business_event", "Alert created");

    notifier::dispatch_created(&alert);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Alert created",
            "data": AlertView::for_viewer(alert, Some(&citizen.id)),
        })),
    )
        .into_response())
}

/// Multipart creation: text fields fill the draft, any field carrying a
/// file name becomes an upload (after the acceptance filter).
async fn collect_draft(
    mut multipart: Multipart,
) -> Result<(AlertDraft, Vec<RawUpload>), ApiError> {
    let mut draft = AlertDraft::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        if let Some(original_name) = file_name {
            let content_type = content_type.unwrap_or_else(|| {
                mime_guess::from_path(&original_name)
                    .first_or_octet_stream()
                    .to_string()
            });
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(e.to_string()))?;
            let upload = RawUpload {
                original_name,
                content_type,
                data,
            };
            if let Err(e) = proofs::check_acceptable(&upload) {
                crate::metrics::increment_uploads_rejected();
                return Err(e);
            }
            uploads.push(upload);
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        match name.as_str() {
            "coordinates" => draft.coordinates = Some(serde_json::Value::String(text)),
            "category" => draft.category = Some(text),
            "title" => draft.title = Some(text),
            "description" => draft.description = Some(text),
            "priority" => draft.priority = Some(text),
            "serviceId" => draft.service_id = Some(text),
            "address" => draft.address = Some(text),
            "isAnonymous" => draft.is_anonymous = Some(serde_json::Value::String(text)),
            "proofs" => {
                draft.proofs = Some(serde_json::from_str(&text).map_err(|e| {
                    ApiError::Validation(format!("malformed proofs field: {e}"))
                })?);
            }
            _ => {}
        }
    }

    Ok((draft, uploads))
}

// GET /alerts/me
pub async fn my_alerts(
    Extension(db): Extension<DatabaseConnection>,
    Extension(citizen): Extension<Citizen>,
) -> Result<Response, ApiError> {
    let alerts = alert::Entity::find()
        .filter(alert::Column::CitizenId.eq(citizen.id.as_str()))
        .order_by_desc(alert::Column::CreatedAt)
        .all(&db)
        .await?;

    let data: Vec<AlertView> = alerts
        .into_iter()
        .map(|a| AlertView::for_viewer(a, Some(&citizen.id)))
        .collect();
    Ok((StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response())
}

#[derive(Debug, Deserialize)]
pub struct NearbyParams {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub distance: Option<f64>,
}

// GET /alerts/nearby
pub async fn nearby_alerts(
    Extension(db): Extension<DatabaseConnection>,
    Extension(citizen): Extension<Citizen>,
    Query(params): Query<NearbyParams>,
) -> Result<Response, ApiError> {
    let (longitude, latitude) = match (params.longitude, params.latitude) {
        (Some(lon), Some(lat)) => (lon, lat),
        _ => {
            return Err(ApiError::Validation(
                "longitude and latitude are required".into(),
            ))
        }
    };
    let center = GeoPoint::new(longitude, latitude)?;
    let distance = params.distance.unwrap_or(DEFAULT_NEARBY_DISTANCE_METERS);

    let alerts = queries::alerts_nearby(&db, center, distance).await?;
    let data: Vec<AlertView> = alerts
        .into_iter()
        .map(|a| AlertView::for_viewer(a, Some(&citizen.id)))
        .collect();
    Ok((StatusCode::OK, Json(json!({ "success": true, "data": data }))).into_response())
}

// GET /alerts/:id
pub async fn get_alert(
    Extension(db): Extension<DatabaseConnection>,
    Extension(citizen): Extension<Citizen>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::Validation("invalid alert id".into()))?;

    // Ownership is folded into not-found so existence never leaks.
    let alert = alert::Entity::find_by_id(id)
        .filter(alert::Column::CitizenId.eq(citizen.id.as_str()))
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert not found".into()))?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": AlertView::for_viewer(alert, Some(&citizen.id)),
        })),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: Option<String>,
}

// POST /alerts/:id/comments
pub async fn add_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(citizen): Extension<Citizen>,
    Path(id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<Response, ApiError> {
    let text = payload
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("comment text is required".into()))?;
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::Validation("invalid alert id".into()))?;

    // Commenting is open to any authenticated citizen, not only the owner.
    let alert = alert::Entity::find_by_id(id)
        .one(&db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Alert not found".into()))?;

    let mut comments = alert.comments.as_array().cloned().unwrap_or_default();
    comments.push(json!({
        "citizen_id": citizen.id,
        "text": text,
        "created_at": Utc::now().naive_utc(),
    }));

    let mut active: alert::ActiveModel = alert.into();
    active.comments = Set(serde_json::Value::Array(comments));
    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&db).await?;

    crate::metrics::increment_comments_added();
    tracing::Span::current()
        .record("action", "add_comment")
        .record("citizen_id", citizen.id.as_str())
        .record("alert_id", tracing::field::display(updated.id));

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Comment added",
            "data": AlertView::for_viewer(updated, Some(&citizen.id)),
        })),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_alert(citizen: Option<&str>, anonymous: bool) -> alert::Model {
        alert::Model {
            id: Uuid::new_v4(),
            service_id: None,
            category: Some("pothole".into()),
            title: None,
            description: Some("deep pothole".into()),
            priority: Some("high".into()),
            location: json!({ "type": "Point", "coordinates": [2.35, 48.85] }),
            address: None,
            is_anonymous: anonymous,
            citizen_id: citizen.map(str::to_string),
            proofs: json!([]),
            status: "pending".into(),
            comments: json!([]),
            created_at: Utc::now().naive_utc(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[test]
    fn anonymous_alerts_hide_the_author_from_other_viewers() {
        let view = AlertView::for_viewer(sample_alert(Some("c1"), true), Some("c2"));
        assert_eq!(view.citizen_id, None);
        assert!(view.is_anonymous);
    }

    #[test]
    fn anonymous_alerts_stay_visible_to_their_author() {
        let view = AlertView::for_viewer(sample_alert(Some("c1"), true), Some("c1"));
        assert_eq!(view.citizen_id.as_deref(), Some("c1"));
    }

    #[test]
    fn named_alerts_expose_the_author() {
        let view = AlertView::for_viewer(sample_alert(Some("c1"), false), Some("c2"));
        assert_eq!(view.citizen_id.as_deref(), Some("c1"));
    }

    #[test]
    fn views_serialize_location_longitude_first() {
        let view = AlertView::for_viewer(sample_alert(Some("c1"), false), None);
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["location"]["type"], "Point");
        assert_eq!(value["location"]["coordinates"][0], 2.35);
        assert_eq!(value["location"]["coordinates"][1], 48.85);
        assert_eq!(value["isAnonymous"], false);
    }
}
