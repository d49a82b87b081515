//! Probe command - writes timestamped blobs and messages

use std::time::Duration;

use bytes::Bytes;
use clap::Args;
use tracing::info;

use crate::domain::{Clock, DomainError, SystemClock};
use crate::Pipeline;

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    /// Number of blob/message pairs to write
    #[arg(long, default_value_t = 1)]
    pub count: u32,

    /// Pause between writes
    #[arg(long, default_value_t = 10)]
    pub interval_secs: u64,
}

/// Keys written by one probe round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeWrite {
    pub blob: String,
    pub message: String,
}

pub async fn run(args: ProbeArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let pipeline = Pipeline::from_config(config)?;

    for round in 1..=args.count {
        let write = probe_once(&pipeline, &SystemClock).await?;
        info!(blob = %write.blob, round, total = args.count, "Probe written");

        if round < args.count {
            tokio::time::sleep(Duration::from_secs(args.interval_secs)).await;
        }
    }

    Ok(())
}

/// Writes `created-at-<ts>` and enqueues `Hello, World! <ts>`
///
/// The message is not a valid sample, so a running trainer acknowledges
/// and skips it.
pub async fn probe_once(pipeline: &Pipeline, clock: &dyn Clock) -> Result<ProbeWrite, DomainError> {
    let timestamp = clock.now_unix_seconds();
    let storage = pipeline.storage();

    let blob = format!("created-at-{}", timestamp);
    storage
        .blobs
        .put(&blob, Bytes::from_static(b"Hello, World!"), true)
        .await?;

    let message = format!("Hello, World! {}", timestamp);
    storage.queue.send(&message).await?;

    Ok(ProbeWrite { blob, message })
}
