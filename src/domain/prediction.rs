//! Prediction result returned to clients

use serde::{Deserialize, Serialize};

use super::model::ModelVersion;

/// Outcome of running the latest model on one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: u8,
    pub confidence: f32,
    pub prediction: String,
    pub version: u64,
    pub version_iso: String,
}

impl Prediction {
    pub fn new(label: u8, confidence: f32, prediction: impl Into<String>, version: ModelVersion) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            prediction: prediction.into(),
            version: version.as_u64(),
            version_iso: version.to_iso(),
        }
    }
}
