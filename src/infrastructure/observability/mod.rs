//! Observability infrastructure - Prometheus metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_eviction, record_cache_lookup,
    record_http_request, record_model_published, record_prediction, record_sample_skipped,
    record_samples_drained, record_training_cycle, PrometheusMetrics,
};
