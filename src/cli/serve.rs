//! Serve command - prediction API, optionally with the training loop

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::{create_router_with_state, with_metrics};
use crate::config::AppConfig;
use crate::domain::{DomainError, SystemClock};
use crate::infrastructure::observability::init_metrics;
use crate::infrastructure::storage::CredentialMode;
use crate::Pipeline;

use super::seed::{seed_storage, SeedInput};

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Also run the training coordinator in this process
    #[arg(long)]
    pub with_trainer: bool,
}

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let metrics = init_metrics(&config.metrics);
    let pipeline = Pipeline::from_config(config.clone())?;

    // In-memory storage starts empty on every run
    if config.storage.credential == CredentialMode::InMemory {
        seed_if_empty(&pipeline).await?;
    }

    let trainer = if args.with_trainer {
        Some(spawn_trainer(&pipeline).await?)
    } else {
        None
    };

    let app = with_metrics(
        create_router_with_state(pipeline.app_state()),
        metrics,
        &config.metrics.path,
    );

    let addr = build_socket_addr(&config)?;
    info!("Starting prediction API on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(super::shutdown_signal())
        .await?;

    if let Some((stop, handle)) = trainer {
        let _ = stop.send(());
        if let Err(e) = handle.await {
            error!(error = %e, "Training task panicked");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn seed_if_empty(pipeline: &Pipeline) -> Result<(), DomainError> {
    match pipeline.version_store().latest().await {
        Ok(_) => Ok(()),
        Err(DomainError::NoVersions { .. }) => {
            let report = seed_storage(pipeline, &SystemClock, SeedInput::default()).await?;
            info!(version = %report.version, "Seeded in-memory storage with an untrained model");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn spawn_trainer(pipeline: &Pipeline) -> anyhow::Result<(oneshot::Sender<()>, JoinHandle<()>)> {
    let mut coordinator = pipeline.coordinator(Arc::new(SystemClock)).await?;
    coordinator.ensure_seeded().await?;

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = stop_rx.await;
        };

        if let Err(e) = coordinator.run(shutdown).await {
            error!(error = %e, kind = e.kind(), "Training coordinator stopped with an error");
        }
    });

    info!("Training coordinator running in-process");
    Ok((stop_tx, handle))
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}
