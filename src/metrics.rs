use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};

use crate::entities::alert;

/// Seeds the alert gauges from the database. Called once at startup;
/// counters below keep them moving afterwards.
pub async fn init_metrics(db: &DatabaseConnection) {
    let total = alert::Entity::find().count(db).await.unwrap_or(0);
    metrics::gauge!("civicpulse_alerts_total").set(total as f64);

    for status in ["pending", "in_progress", "resolved", "rejected"] {
        let count = alert::Entity::find()
            .filter(alert::Column::Status.eq(status))
            .count(db)
            .await
            .unwrap_or(0);
        metrics::gauge!("civicpulse_alerts_by_status", "status" => status).set(count as f64);
    }

    tracing::info!("Initialized metrics: Alerts={}", total);
}

pub fn increment_alerts_created(category: &str) {
    metrics::counter!("civicpulse_alerts_created_total", "category" => category.to_string())
        .increment(1);
    metrics::gauge!("civicpulse_alerts_total").increment(1.0);
}

pub fn increment_proofs_processed(kind: &str) {
    metrics::counter!("civicpulse_proofs_processed_total", "kind" => kind.to_string()).increment(1);
}

pub fn increment_uploads_rejected() {
    metrics::counter!("civicpulse_uploads_rejected_total").increment(1);
}

pub fn increment_comments_added() {
    metrics::counter!("civicpulse_comments_added_total").increment(1);
}

pub fn increment_status_transitions(status: &str) {
    metrics::counter!("civicpulse_status_transitions_total", "status" => status.to_string())
        .increment(1);
}
