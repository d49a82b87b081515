//! Submit command - producer side of the training queue

use std::path::PathBuf;

use anyhow::Context;
use bytes::Bytes;
use clap::Args;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{DomainError, Label, MessageScheme, SampleEnvelope, TransportMessage};
use crate::infrastructure::ingestion::ImageNormalizer;
use crate::Pipeline;

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// PNG or JPEG image to submit
    pub image: PathBuf,

    /// Class name or numeric label
    #[arg(long)]
    pub label: Option<String>,

    /// Enqueue the codec string instead of uploading the image
    #[arg(long)]
    pub inline: bool,
}

/// What was written for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub blob: Option<String>,
    pub message: String,
}

pub async fn run(args: SubmitArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let pipeline = Pipeline::from_config(config)?;

    let file_name = args
        .image
        .file_name()
        .and_then(|n| n.to_str())
        .context("Image path has no file name")?
        .to_string();
    let data = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let label = args
        .label
        .as_deref()
        .map(|l| pipeline.codec().labels().parse(l))
        .transpose()?;

    let scheme = if args.inline {
        MessageScheme::Inline
    } else {
        MessageScheme::Envelope
    };
    if scheme != pipeline.config().pipeline.message_scheme {
        warn!(
            submitted = %scheme,
            configured = %pipeline.config().pipeline.message_scheme,
            "Submitting with a scheme the trainer is not configured for"
        );
    }

    let submission = submit_sample(&pipeline, Bytes::from(data), &file_name, label, scheme).await?;

    info!(blob = ?submission.blob, scheme = %scheme, "Sample submitted");

    Ok(())
}

/// Uploads and enqueues one image in the given wire form
pub async fn submit_sample(
    pipeline: &Pipeline,
    image: Bytes,
    file_name: &str,
    label: Option<Label>,
    scheme: MessageScheme,
) -> Result<Submission, DomainError> {
    let accepted = mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str() == "image/png" || m.essence_str() == "image/jpeg")
        .unwrap_or(false);
    if !accepted {
        return Err(DomainError::invalid_input(format!(
            "'{}' is not a png or jpeg image",
            file_name
        )));
    }

    let grid = ImageNormalizer::new().normalize(&image)?;
    let storage = pipeline.storage();

    let (blob, message) = match scheme {
        MessageScheme::Envelope => {
            let key = format!("{}_{}", Uuid::new_v4(), file_name);
            storage.blobs.put(&key, image, false).await?;

            let envelope = SampleEnvelope::new(key.clone(), label.map(|l| l.value() as i64));
            (Some(key), TransportMessage::Envelope(envelope))
        }
        MessageScheme::Inline => {
            let label = label.ok_or_else(|| {
                DomainError::invalid_input("Inline submissions need a label")
            })?;
            let encoded = pipeline.codec().encode(&grid, Some(label))?;
            (None, TransportMessage::Inline(encoded))
        }
    };

    let text = message.to_text()?;
    storage.queue.send(&text).await?;

    Ok(Submission {
        blob,
        message: text,
    })
}
