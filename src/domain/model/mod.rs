//! Model domain - versions, artifact naming and the training/inference seams

mod capability;
mod version;

pub use capability::{
    arg_max, softmax, Evaluation, Predictor, Scores, Trainer, TrainingBatch, ValidationSet,
};
pub use version::{ArtifactNaming, ModelVersion, MODELS_DIR};
