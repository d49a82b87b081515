//! Prometheus metrics infrastructure

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Router};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use regex::Regex;

use super::config::MetricsConfig;

static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Prometheus metrics handle for serving metrics endpoint
#[derive(Clone)]
pub struct PrometheusMetrics {
    handle: Arc<PrometheusHandle>,
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl PrometheusMetrics {
    /// Get the metrics as a string for the /metrics endpoint
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Initialize Prometheus metrics
pub fn init_metrics(config: &MetricsConfig) -> Option<PrometheusMetrics> {
    if !config.enabled {
        tracing::info!("Prometheus metrics disabled");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            gauge!("retrain_pipeline_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);

            tracing::info!("Prometheus metrics initialized at {}", config.path);

            Some(PrometheusMetrics {
                handle: Arc::new(handle),
            })
        }
        Err(e) => {
            tracing::error!("Failed to initialize Prometheus metrics: {}", e);
            None
        }
    }
}

/// Create the metrics router
pub fn create_metrics_router(metrics: PrometheusMetrics, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    metrics.render()
}

/// Record an HTTP request metric
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    if status >= 500 {
        counter!("http_server_errors_total", &labels).increment(1);
    }
}

pub fn record_samples_drained(count: usize) {
    counter!("pipeline_samples_drained_total").increment(count as u64);
}

pub fn record_sample_skipped(reason: &'static str) {
    counter!("pipeline_samples_skipped_total", "reason" => reason).increment(1);
}

/// Outcome is one of `idle`, `empty`, `published`, `error`
pub fn record_training_cycle(outcome: &'static str, duration: Duration) {
    counter!("pipeline_training_cycles_total", "outcome" => outcome).increment(1);
    histogram!("pipeline_training_cycle_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

pub fn record_model_published(version: u64, samples: usize) {
    counter!("pipeline_models_published_total").increment(1);
    gauge!("pipeline_latest_model_version").set(version as f64);
    histogram!("pipeline_training_batch_size").record(samples as f64);
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("model_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_eviction() {
    counter!("model_cache_evictions_total").increment(1);
}

pub fn record_prediction(label: &str, success: bool, duration: Duration) {
    let labels = [
        ("label", label.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];

    counter!("predictions_total", &labels).increment(1);
    histogram!("prediction_duration_seconds", &labels).record(duration.as_secs_f64());
}

/// Sanitize URL path for metric labels (limit cardinality)
fn sanitize_path(path: &str) -> String {
    let path = NUMERIC_SEGMENT.replace_all(path, "/{id}$1");

    if path.len() > 50 {
        path[..50].to_string()
    } else {
        path.to_string()
    }
}
