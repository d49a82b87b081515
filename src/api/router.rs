use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::infrastructure::observability::{create_metrics_router, PrometheusMetrics};

use super::health;
use super::middleware::metrics_middleware;
use super::predict;
use super::state::AppState;

/// Upper bound for uploaded images
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        .route("/predict", post(predict::predict))
        .route("/predict/encoded", post(predict::predict_encoded))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Adds the Prometheus endpoint when metrics are enabled
pub fn with_metrics(router: Router, metrics: Option<PrometheusMetrics>, path: &str) -> Router {
    match metrics {
        Some(m) => router.merge(create_metrics_router(m, path)),
        None => router,
    }
}
