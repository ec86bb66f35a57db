use axum::{
    routing::{get, post},
    Extension, Router,
};
use civicpulse_server::proofs::{ProofProcessor, ProofStore, MAX_UPLOAD_BYTES};
use civicpulse_server::{api, migrator};
use sea_orm::{Database, DatabaseConnection};
use std::net::SocketAddr;

#[tokio::main]
async fn main() {
    // Load .env if present (dotenvy)
    dotenvy::dotenv().ok();

    civicpulse_server::telemetry::init_telemetry("civicpulse-server");

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    // Database Connection
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    use sea_orm_migration::MigratorTrait;
    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Upload folder bootstrap happens once, here, not inside a constructor.
    let store = ProofStore::from_env();
    store
        .ensure_folders()
        .await
        .expect("Failed to create upload folders");
    let processor = ProofProcessor::new(store.clone());

    // Initialize Metrics
    civicpulse_server::metrics::init_metrics(&db).await;

    let app = app(db, store, processor, prometheus_layer, metric_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8000));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> &'static str {
    "OK"
}

fn app(
    db: DatabaseConnection,
    store: ProofStore,
    processor: ProofProcessor,
    prometheus_layer: axum_prometheus::PrometheusMetricLayer<'static>,
    metric_handle: metrics_exporter_prometheus::PrometheusHandle,
) -> Router {
    // Service-to-service path: shared secret, not citizen auth.
    let webhook_routes =
        Router::new().route("/alerts/webhook/status", post(api::webhook::update_status));

    let citizen_routes = Router::new()
        .route("/alerts", post(api::alerts::create_alert))
        .route("/alerts/me", get(api::alerts::my_alerts))
        .route("/alerts/nearby", get(api::alerts::nearby_alerts))
        .route("/alerts/:id", get(api::alerts::get_alert))
        .route("/alerts/:id/comments", post(api::alerts::add_comment))
        .route(
            "/alerts/upload",
            post(api::uploads::upload_proof).delete(api::uploads::delete_upload),
        )
        .route("/alerts/uploads", post(api::uploads::upload_proofs))
        .route_layer(axum::middleware::from_fn(api::middleware::auth_middleware));

    let cors_origin =
        std::env::var("CORS_ALLOWED_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

    Router::new()
        .route("/health", get(health_check))
        .merge(webhook_routes)
        .merge(citizen_routes)
        // Processed proof assets are served straight off the storage root.
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(store.root().to_path_buf()),
        )
        .layer(Extension(db))
        .layer(Extension(processor))
        .layer(prometheus_layer)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    // Dynamic span name: "METHOD /path" (e.g., "POST /alerts")
                    let span_name = if let Some(path) = matched_path {
                        format!("{} {}", request.method(), path)
                    } else {
                        format!("{} {}", request.method(), request.uri().path())
                    };

                    let client_ip = request
                        .headers()
                        .get("x-forwarded-for")
                        .and_then(|v| v.to_str().ok())
                        .or_else(|| {
                            request
                                .headers()
                                .get("x-real-ip")
                                .and_then(|v| v.to_str().ok())
                        })
                        .unwrap_or("unknown");

                    // Fields left empty here are filled in by the handlers.
                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        client_ip = client_ip,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        action = tracing::field::Empty,
                        citizen_id = tracing::field::Empty,
                        alert_id = tracing::field::Empty,
                        business_event = tracing::field::Empty,
                        error = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency = tracing::field::Empty,
                    )
                })
                .on_request(
                    |_request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {
                        // The completion event below is enough; skip the default
                        // "started processing request" line.
                    },
                )
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record("status", tracing::field::display(response.status()));
                        span.record("latency", tracing::field::debug(latency));

                        tracing::info!("request completed");
                    },
                ),
        )
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(
                    cors_origin
                        .parse::<axum::http::HeaderValue>()
                        .expect("invalid CORS_ALLOWED_ORIGIN"),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true),
        )
        .route("/metrics", get(|| async move { metric_handle.render() }))
        // Room for the 5-file batch endpoint at the per-file cap.
        .layer(axum::extract::DefaultBodyLimit::max(
            MAX_UPLOAD_BYTES * 5 + 1024 * 1024,
        ))
}
