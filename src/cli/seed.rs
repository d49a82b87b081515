//! Seed command - prepares storage and publishes the first model

use std::path::PathBuf;

use anyhow::Context;
use bytes::Bytes;
use clap::Args;
use tracing::info;

use crate::domain::{Clock, DomainError, ModelVersion, SystemClock};
use crate::infrastructure::ml::CentroidModel;
use crate::Pipeline;

#[derive(Args, Debug, Clone, Default)]
pub struct SeedArgs {
    /// Model artifact to publish instead of an untrained one
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Version (Unix seconds) to publish under; defaults to now
    #[arg(long)]
    pub version: Option<u64>,

    /// Validation asset, uploaded to `pipeline.validation_key`
    #[arg(long)]
    pub validation: Option<PathBuf>,
}

/// What to upload while seeding
#[derive(Debug, Clone, Default)]
pub struct SeedInput {
    pub model: Option<Bytes>,
    pub version: Option<u64>,
    pub validation: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub container_created: bool,
    pub queue_created: bool,
    pub version: ModelVersion,
    pub validation_key: Option<String>,
}

pub async fn run(args: SeedArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let pipeline = Pipeline::from_config(config)?;

    let input = SeedInput {
        model: read_optional(args.model.as_ref()).await?,
        version: args.version,
        validation: read_optional(args.validation.as_ref()).await?,
    };

    let report = seed_storage(&pipeline, &SystemClock, input).await?;

    info!(
        version = %report.version,
        container_created = report.container_created,
        queue_created = report.queue_created,
        validation_key = ?report.validation_key,
        "Storage seeded"
    );

    Ok(())
}

/// Creates the container and queue when missing and publishes a model
pub async fn seed_storage(
    pipeline: &Pipeline,
    clock: &dyn Clock,
    input: SeedInput,
) -> Result<SeedReport, DomainError> {
    let storage = pipeline.storage();

    let container_created = storage.blobs.ensure_container().await?;
    let queue_created = storage.queue.ensure_queue().await?;

    let artifact = match input.model {
        Some(bytes) => bytes,
        None => {
            let (width, height) = pipeline.codec().size();
            let classes = pipeline.codec().labels().len();
            Bytes::from(CentroidModel::with_size(classes, width, height).to_bytes()?)
        }
    };

    let version = ModelVersion::new(input.version.unwrap_or_else(|| clock.now_unix_seconds()))?;
    pipeline.version_store().publish(version, artifact).await?;

    let validation_key = match input.validation {
        Some(bytes) => {
            let key = pipeline.config().pipeline.validation_key.clone().ok_or_else(|| {
                DomainError::configuration("pipeline.validation_key must be set to upload a validation asset")
            })?;
            storage.blobs.put(&key, bytes, true).await?;
            info!(key = %key, "Uploaded validation asset");
            Some(key)
        }
        None => None,
    };

    Ok(SeedReport {
        container_created,
        queue_created,
        version,
        validation_key,
    })
}

async fn read_optional(path: Option<&PathBuf>) -> anyhow::Result<Option<Bytes>> {
    match path {
        Some(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(Some(Bytes::from(data)))
        }
        None => Ok(None),
    }
}
