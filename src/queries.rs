use sea_orm::{DatabaseConnection, DbBackend, DbErr, EntityTrait, Statement};

use crate::entities::alert;
use crate::geo::GeoPoint;

/// Proximity search over the stored GeoJSON location, nearest first.
/// Distance is great-circle meters (haversine over the extracted
/// longitude/latitude), so it runs on stock Postgres with no geo
/// extension. `$1` longitude, `$2` latitude, `$3` radius in meters.
pub const NEARBY_ALERTS_SQL: &str = r#"
SELECT id, service_id, category, title, description, priority, location, address,
       is_anonymous, citizen_id, proofs, status, comments, created_at, updated_at
FROM (
    SELECT *,
           2.0 * 6371000.0 * asin(sqrt(
               pow(sin(radians(((location->'coordinates'->>1)::float8 - $2) / 2.0)), 2)
               + cos(radians($2)) * cos(radians((location->'coordinates'->>1)::float8))
               * pow(sin(radians(((location->'coordinates'->>0)::float8 - $1) / 2.0)), 2)
           )) AS distance_meters
    FROM alerts
) candidates
WHERE distance_meters <= $3
ORDER BY distance_meters ASC;
"#;

pub async fn alerts_nearby(
    db: &DatabaseConnection,
    center: GeoPoint,
    max_distance_meters: f64,
) -> Result<Vec<alert::Model>, DbErr> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        NEARBY_ALERTS_SQL,
        [
            center.longitude.into(),
            center.latitude.into(),
            max_distance_meters.into(),
        ],
    );
    alert::Entity::find().from_raw_sql(stmt).all(db).await
}
