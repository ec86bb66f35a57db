use serde_json::json;
use tracing::{error, info};

use crate::entities::alert;

/// Forwards a newly created alert to the downstream orchestrator when the
/// alert targets a service and a dispatch URL is configured. Spawned so
/// alert creation never blocks on it; the outcome is only logged.
pub fn dispatch_created(alert: &alert::Model) {
    let Some(service_id) = alert.service_id.clone() else {
        return;
    };
    let Ok(dispatch_url) = std::env::var("SERVICE_DISPATCH_URL") else {
        return;
    };

    let payload = json!({
        "alertId": alert.id,
        "serviceId": service_id,
        "category": alert.category,
        "priority": alert.priority,
        "location": alert.location,
        "status": alert.status,
    });

    tokio::spawn(async move {
        let client = reqwest::Client::new();
        match client.post(&dispatch_url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!(url = %dispatch_url, "alert dispatched to downstream service");
            }
            Ok(resp) => {
                error!(status = %resp.status(), "downstream service rejected the dispatch");
            }
            Err(e) => {
                error!(error = %e, "failed to reach downstream service");
            }
        }
    });
}
