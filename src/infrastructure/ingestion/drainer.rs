//! Queue drainer - turns queued sample references into a training batch

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::normalize::ImageNormalizer;
use crate::domain::{
    BlobStore, DomainError, MessageQueue, MessageScheme, QueueMessage, Sample, SampleCodec,
    SampleRef, TransportMessage,
};
use crate::infrastructure::observability::{record_sample_skipped, record_samples_drained};

/// Why a message did not contribute a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The referenced blob is gone; the message was acknowledged
    MissingBlob,
    /// Unparsable message or image; acknowledged as poison
    Malformed,
    /// Store error while fetching; left for redelivery
    Transient,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingBlob => "missing_blob",
            Self::Malformed => "malformed",
            Self::Transient => "transient",
        }
    }

    fn acknowledges(&self) -> bool {
        !matches!(self, Self::Transient)
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SkippedMessage {
    pub message_id: String,
    pub reason: SkipReason,
    pub error: String,
}

/// Outcome of one drain
#[derive(Debug, Default)]
pub struct DrainReport {
    pub samples: Vec<(Sample, SampleRef)>,
    pub skipped: Vec<SkippedMessage>,
}

impl DrainReport {
    /// Messages that stay on the queue and will be redelivered
    pub fn left_for_redelivery(&self) -> usize {
        self.skipped
            .iter()
            .filter(|s| !s.reason.acknowledges())
            .count()
    }
}

/// Consumes every currently visible queue message
#[derive(Debug, Clone)]
pub struct QueueDrainer {
    queue: Arc<dyn MessageQueue>,
    blobs: Arc<dyn BlobStore>,
    codec: SampleCodec,
    normalizer: ImageNormalizer,
    scheme: MessageScheme,
}

impl QueueDrainer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        blobs: Arc<dyn BlobStore>,
        codec: SampleCodec,
        scheme: MessageScheme,
    ) -> Self {
        Self {
            queue,
            blobs,
            codec,
            normalizer: ImageNormalizer::new(),
            scheme,
        }
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn scheme(&self) -> MessageScheme {
        self.scheme
    }

    /// Samples from every message received until the queue reports an
    /// empty page
    pub async fn drain(&self, batch_limit: usize) -> Result<Vec<(Sample, SampleRef)>, DomainError> {
        Ok(self.drain_with_report(batch_limit).await?.samples)
    }

    pub async fn drain_with_report(&self, batch_limit: usize) -> Result<DrainReport, DomainError> {
        if batch_limit == 0 {
            return Err(DomainError::configuration("Batch limit must be positive"));
        }

        let mut report = DrainReport::default();
        let mut consumed_blobs = BTreeSet::new();
        let mut first_page = true;

        loop {
            let page = match self.queue.receive(batch_limit).await {
                Ok(page) => page,
                Err(e) if first_page => return Err(e),
                Err(e) => {
                    warn!(error = %e, drained = report.samples.len(), "Receive failed mid-drain, keeping partial batch");
                    break;
                }
            };
            first_page = false;

            if page.is_empty() {
                break;
            }

            debug!(messages = page.len(), "Received queue page");

            for message in page {
                self.process(message, &mut report, &mut consumed_blobs).await;
            }
        }

        for key in consumed_blobs {
            if let Err(e) = self.blobs.delete(&key).await {
                warn!(blob = %key, error = %e, "Failed to delete consumed blob");
            }
        }

        record_samples_drained(report.samples.len());
        info!(
            samples = report.samples.len(),
            skipped = report.skipped.len(),
            left_for_redelivery = report.left_for_redelivery(),
            "Drained queue"
        );

        Ok(report)
    }

    async fn process(
        &self,
        message: QueueMessage,
        report: &mut DrainReport,
        consumed_blobs: &mut BTreeSet<String>,
    ) {
        let parsed = TransportMessage::parse(&message.content, self.scheme);
        let image_name = match &parsed {
            Ok(TransportMessage::Envelope(envelope)) => Some(envelope.image_name.clone()),
            _ => None,
        };

        let resolved = match parsed {
            Ok(transport) => self.resolve(transport).await,
            Err(e) => Err(e),
        };

        match resolved {
            Ok(sample) => {
                report.samples.push((
                    sample,
                    SampleRef {
                        message_id: message.id.clone(),
                        image_name: image_name.clone(),
                    },
                ));

                if let Err(e) = self.queue.delete(&message).await {
                    warn!(message_id = %message.id, error = %e, "Failed to acknowledge message, it may be redelivered");
                }

                if let Some(name) = image_name {
                    consumed_blobs.insert(name);
                }
            }
            Err(e) => {
                let reason = if matches!(e, DomainError::MissingResource { .. }) {
                    SkipReason::MissingBlob
                } else if e.is_malformed_sample() {
                    SkipReason::Malformed
                } else {
                    SkipReason::Transient
                };

                warn!(
                    message_id = %message.id,
                    dequeue_count = message.dequeue_count,
                    reason = %reason,
                    error = %e,
                    "Skipping queue message"
                );
                record_sample_skipped(reason.as_str());

                if reason.acknowledges() {
                    if let Err(ack) = self.queue.delete(&message).await {
                        warn!(message_id = %message.id, error = %ack, "Failed to acknowledge skipped message");
                    }
                }

                // Nothing references a poison message's blob once it is acked
                if reason == SkipReason::Malformed {
                    if let Some(name) = image_name {
                        consumed_blobs.insert(name);
                    }
                }

                report.skipped.push(SkippedMessage {
                    message_id: message.id,
                    reason,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn resolve(&self, transport: TransportMessage) -> Result<Sample, DomainError> {
        match transport {
            TransportMessage::Envelope(envelope) => {
                let label = envelope
                    .label
                    .map(|value| self.codec.labels().label(value))
                    .transpose()?;

                let bytes = self.blobs.get(&envelope.image_name).await?;
                let grid = self.normalizer.normalize(&bytes)?;

                Ok(Sample::new(grid, label))
            }
            TransportMessage::Inline(encoded) => {
                let (grid, label) = self.codec.decode(&encoded, true)?;
                Ok(Sample::new(grid, label))
            }
        }
    }
}
