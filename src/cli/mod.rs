//! CLI module for the retraining pipeline
//!
//! Subcommands:
//! - `serve`: prediction API, optionally with the training loop in-process
//! - `train`: training loop only
//! - `seed`: create the container and queue, upload an initial model
//! - `submit`: upload a labeled image and enqueue it for training
//! - `probe`: write a timestamp blob and message to check connectivity

pub mod probe;
pub mod seed;
pub mod serve;
pub mod submit;
pub mod train;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Retrain Pipeline - continuous retraining and versioned model serving
#[derive(Parser)]
#[command(name = "retrain-pipeline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the prediction API
    Serve(serve::ServeArgs),

    /// Run the training coordinator loop
    Train,

    /// Create storage resources and upload the initial model
    Seed(seed::SeedArgs),

    /// Upload a labeled image and enqueue it as a training sample
    Submit(submit::SubmitArgs),

    /// Write timestamped blobs and messages to check storage access
    Probe(probe::ProbeArgs),
}

/// Loads `.env` and the configuration, then installs logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config.logging);

    Ok(config)
}

/// Resolves on Ctrl+C or SIGTERM
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
