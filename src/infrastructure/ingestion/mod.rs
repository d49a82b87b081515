//! Sample ingestion - queue draining and image normalization

mod drainer;
mod normalize;

pub use drainer::{DrainReport, QueueDrainer, SkipReason, SkippedMessage};
pub use normalize::{encode_png, ImageNormalizer, DEFAULT_THRESHOLD};
