use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::{LogFormat, LoggingConfig};

/// HTTP client internals log every storage request at debug
const QUIET_TARGETS: [&str; 3] = ["hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Filter from `RUST_LOG`, else the configured level with chatty client
/// crates held at warn
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = std::iter::once(level)
            .chain(QUIET_TARGETS)
            .collect::<Vec<_>>()
            .join(",");
        EnvFilter::new(directives)
    })
}

/// Installs the global subscriber
pub fn init_logging(config: &LoggingConfig) {
    let filter = build_filter(&config.level);

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!(level = %config.level, format = ?config.format, "Logging initialized"),
        Err(e) => tracing::debug!(error = %e, "Subscriber already installed"),
    }
}
