//! Narrow training and inference capabilities
//!
//! The pipeline only moves opaque artifact bytes around; everything that
//! understands those bytes sits behind `Trainer` and `Predictor`.

use bytes::Bytes;

use crate::domain::sample::{BitGrid, Sample};
use crate::domain::DomainError;

/// Samples folded together for one training run
///
/// Redelivered messages show up as repeated samples; trainers aggregate them
/// like any other sample.
#[derive(Debug, Clone, Default)]
pub struct TrainingBatch {
    samples: Vec<Sample>,
}

impl TrainingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl FromIterator<Sample> for TrainingBatch {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

/// Fixed validation asset, loaded once and handed to `Trainer::evaluate`
#[derive(Debug, Clone)]
pub struct ValidationSet(Bytes);

impl ValidationSet {
    pub fn new(data: Bytes) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Diagnostics from evaluating a model against the validation set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub samples: usize,
    pub accuracy: f32,
}

/// Produces a new artifact from the current one plus a batch
pub trait Trainer: Send + Sync {
    fn fit(&self, base: &[u8], batch: &TrainingBatch) -> Result<Vec<u8>, DomainError>;

    fn evaluate(&self, model: &[u8], validation: &ValidationSet) -> Result<Evaluation, DomainError>;
}

/// Per-class output of a predictor
#[derive(Debug, Clone, PartialEq)]
pub enum Scores {
    /// Unnormalized scores; softmax is applied before use
    Raw(Vec<f32>),
    /// Already a probability distribution
    Probabilities(Vec<f32>),
}

impl Scores {
    pub fn len(&self) -> usize {
        match self {
            Scores::Raw(v) | Scores::Probabilities(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_probabilities(self) -> Vec<f32> {
        match self {
            Scores::Raw(raw) => softmax(&raw),
            Scores::Probabilities(p) => p,
        }
    }
}

/// Runs inference with an artifact
pub trait Predictor: Send + Sync {
    fn predict(&self, model: &[u8], input: &BitGrid) -> Result<Scores, DomainError>;
}

/// Numerically stable softmax
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    if !max.is_finite() {
        let uniform = 1.0 / scores.len().max(1) as f32;
        return vec![uniform; scores.len()];
    }

    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();

    exps.into_iter().map(|e| e / total).collect()
}

/// Index of the largest value; ties resolve to the first
pub fn arg_max(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
            Some((_, b)) if *v <= b => best,
            _ => Some((i, *v)),
        })
        .map(|(i, _)| i)
}
