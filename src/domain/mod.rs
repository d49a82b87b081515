//! Domain layer - Core pipeline types, capabilities and errors

pub mod clock;
pub mod error;
pub mod model;
pub mod prediction;
pub mod sample;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::DomainError;
pub use model::{
    ArtifactNaming, Evaluation, ModelVersion, Predictor, Scores, Trainer, TrainingBatch,
    ValidationSet,
};
pub use prediction::Prediction;
pub use sample::{
    BitGrid, Label, LabelSet, MessageScheme, Sample, SampleCodec, SampleEnvelope, SampleRef,
    TransportMessage,
};
pub use storage::{BlobStore, MessageQueue, QueueMessage};
