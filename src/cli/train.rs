//! Train command - runs the coordinator loop until shutdown

use std::sync::Arc;

use tracing::info;

use crate::domain::SystemClock;
use crate::Pipeline;

pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let pipeline = Pipeline::from_config(config)?;

    let mut coordinator = pipeline.coordinator(Arc::new(SystemClock)).await?;
    coordinator.ensure_seeded().await?;

    coordinator.run(super::shutdown_signal()).await?;

    info!("Training coordinator stopped");
    Ok(())
}
