//! Nearest-centroid reference model
//!
//! Keeps per-class pixel sums and sample counts. Fitting only adds to those
//! totals, so the artifact grows by aggregation and a duplicated sample merely
//! reweights its class.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::model::arg_max;
use crate::domain::sample::{SAMPLE_HEIGHT, SAMPLE_WIDTH};
use crate::domain::{
    BitGrid, DomainError, Evaluation, Predictor, Sample, SampleCodec, Scores, Trainer,
    TrainingBatch, ValidationSet,
};

/// Scale applied to the mean pixel disagreement before softmax
const SHARPNESS: f32 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCentroid {
    pub sums: Vec<u32>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    pub width: usize,
    pub height: usize,
    pub classes: Vec<ClassCentroid>,
}

impl CentroidModel {
    /// Untrained model, used as the seed artifact
    pub fn empty(classes: usize) -> Self {
        Self::with_size(classes, SAMPLE_WIDTH, SAMPLE_HEIGHT)
    }

    pub fn with_size(classes: usize, width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            classes: vec![
                ClassCentroid {
                    sums: vec![0; width * height],
                    count: 0,
                };
                classes
            ],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        let model: Self = serde_json::from_slice(bytes)
            .map_err(|e| DomainError::model(format!("Invalid centroid artifact: {}", e)))?;

        let pixels = model.width * model.height;
        if model.classes.iter().any(|c| c.sums.len() != pixels) {
            return Err(DomainError::model("Centroid artifact has inconsistent dimensions"));
        }

        Ok(model)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self)
            .map_err(|e| DomainError::model(format!("Failed to serialize centroid artifact: {}", e)))
    }

    pub fn samples_seen(&self) -> u64 {
        self.classes.iter().map(|c| c.count).sum()
    }

    /// Adds a labeled sample; returns false when it cannot be used
    pub fn absorb(&mut self, sample: &Sample) -> bool {
        let Some(label) = sample.label else {
            return false;
        };

        if sample.grid.width() != self.width || sample.grid.height() != self.height {
            return false;
        }

        let Some(class) = self.classes.get_mut(label.index()) else {
            return false;
        };

        for (sum, bit) in class.sums.iter_mut().zip(sample.grid.bits()) {
            *sum += u32::from(*bit);
        }
        class.count += 1;

        true
    }

    /// Negative scaled distance to each class centroid; untrained classes
    /// score negative infinity
    pub fn scores(&self, grid: &BitGrid) -> Result<Vec<f32>, DomainError> {
        if grid.width() != self.width || grid.height() != self.height {
            return Err(DomainError::size_mismatch(self.width * self.height, grid.len()));
        }

        let pixels = grid.len().max(1) as f32;

        Ok(self
            .classes
            .iter()
            .map(|class| {
                if class.count == 0 {
                    return f32::NEG_INFINITY;
                }

                let count = class.count as f32;
                let distance: f32 = class
                    .sums
                    .iter()
                    .zip(grid.bits())
                    .map(|(sum, bit)| {
                        let mean = *sum as f32 / count;
                        let value = if *bit { 1.0 } else { 0.0 };
                        (mean - value).powi(2)
                    })
                    .sum();

                -SHARPNESS * distance / pixels
            })
            .collect())
    }
}

/// Trainer producing `CentroidModel` artifacts
#[derive(Debug, Clone)]
pub struct CentroidTrainer {
    codec: SampleCodec,
}

impl CentroidTrainer {
    pub fn new(codec: SampleCodec) -> Self {
        Self { codec }
    }

    fn base_model(&self, base: &[u8]) -> Result<CentroidModel, DomainError> {
        if base.is_empty() {
            let (width, height) = self.codec.size();
            return Ok(CentroidModel::with_size(self.codec.labels().len(), width, height));
        }

        let mut model = CentroidModel::from_bytes(base)?;
        let classes = self.codec.labels().len();

        if model.classes.len() < classes {
            let pixels = model.width * model.height;
            model.classes.resize(
                classes,
                ClassCentroid {
                    sums: vec![0; pixels],
                    count: 0,
                },
            );
        }

        Ok(model)
    }
}

impl Trainer for CentroidTrainer {
    fn fit(&self, base: &[u8], batch: &TrainingBatch) -> Result<Vec<u8>, DomainError> {
        let mut model = self.base_model(base)?;
        let mut ignored = 0usize;

        for sample in batch.samples() {
            if !model.absorb(sample) {
                ignored += 1;
            }
        }

        if ignored > 0 {
            warn!(ignored, "Ignored unlabeled or mis-sized samples during fit");
        }

        debug!(
            absorbed = batch.len() - ignored,
            total = model.samples_seen(),
            "Fitted centroid model"
        );

        model.to_bytes()
    }

    fn evaluate(&self, model: &[u8], validation: &ValidationSet) -> Result<Evaluation, DomainError> {
        let model = CentroidModel::from_bytes(model)?;
        let text = std::str::from_utf8(validation.as_bytes())
            .map_err(|_| DomainError::model("Validation set is not a list of encoded samples"))?;

        let mut samples = 0usize;
        let mut correct = 0usize;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Ok((grid, Some(label))) = self.codec.decode(line, true) else {
                continue;
            };

            samples += 1;
            if arg_max(&model.scores(&grid)?) == Some(label.index()) {
                correct += 1;
            }
        }

        let accuracy = if samples == 0 {
            0.0
        } else {
            correct as f32 / samples as f32
        };

        Ok(Evaluation { samples, accuracy })
    }
}

/// Predictor for `CentroidModel` artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidPredictor;

impl Predictor for CentroidPredictor {
    fn predict(&self, model: &[u8], input: &BitGrid) -> Result<Scores, DomainError> {
        let model = CentroidModel::from_bytes(model)?;
        Ok(Scores::Raw(model.scores(input)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LabelSet;

    fn codec() -> SampleCodec {
        SampleCodec::new(LabelSet::hello_world())
    }

    /// Left half set for label 0, right half set for label 1
    fn half(label_value: i64) -> Sample {
        let labels = LabelSet::hello_world();
        let mut grid = BitGrid::sample();
        for x in 0..SAMPLE_WIDTH {
            for y in 0..SAMPLE_HEIGHT {
                let left = x < SAMPLE_WIDTH / 2;
                grid.set(x, y, if label_value == 0 { left } else { !left });
            }
        }
        Sample::labeled(grid, labels.label(label_value).unwrap())
    }

    #[test]
    fn test_fit_from_empty_seed() {
        let trainer = CentroidTrainer::new(codec());
        let seed = CentroidModel::empty(2).to_bytes().unwrap();
        let batch: TrainingBatch = vec![half(0), half(1), half(1)].into_iter().collect();

        let model = CentroidModel::from_bytes(&trainer.fit(&seed, &batch).unwrap()).unwrap();
        assert_eq!(model.classes[0].count, 1);
        assert_eq!(model.classes[1].count, 2);
    }

    #[test]
    fn test_fit_is_additive() {
        let trainer = CentroidTrainer::new(codec());
        let once: TrainingBatch = vec![half(0)].into_iter().collect();

        let first = trainer.fit(&[], &once).unwrap();
        let second = trainer.fit(&first, &once).unwrap();

        let model = CentroidModel::from_bytes(&second).unwrap();
        assert_eq!(model.classes[0].count, 2);
        assert_eq!(model.classes[0].sums[0], 2);
    }

    #[test]
    fn test_unlabeled_samples_are_ignored() {
        let trainer = CentroidTrainer::new(codec());
        let batch: TrainingBatch = vec![Sample::new(BitGrid::sample(), None)].into_iter().collect();

        let model = CentroidModel::from_bytes(&trainer.fit(&[], &batch).unwrap()).unwrap();
        assert_eq!(model.samples_seen(), 0);
    }

    #[test]
    fn test_predicts_nearest_class() {
        let trainer = CentroidTrainer::new(codec());
        let batch: TrainingBatch = vec![half(0), half(1)].into_iter().collect();
        let artifact = trainer.fit(&[], &batch).unwrap();

        let probabilities = CentroidPredictor
            .predict(&artifact, &half(1).grid)
            .unwrap()
            .into_probabilities();

        assert_eq!(arg_max(&probabilities), Some(1));
        assert!(probabilities[1] > 0.99);
    }

    #[test]
    fn test_untrained_model_is_uniform() {
        let artifact = CentroidModel::empty(2).to_bytes().unwrap();
        let probabilities = CentroidPredictor
            .predict(&artifact, &BitGrid::sample())
            .unwrap()
            .into_probabilities();

        assert_eq!(probabilities, vec![0.5, 0.5]);
    }

    #[test]
    fn test_evaluate_over_encoded_samples() {
        let codec = codec();
        let trainer = CentroidTrainer::new(codec.clone());
        let batch: TrainingBatch = vec![half(0), half(1)].into_iter().collect();
        let artifact = trainer.fit(&[], &batch).unwrap();

        let lines: Vec<String> = [half(0), half(1)]
            .iter()
            .map(|s| codec.encode(&s.grid, s.label).unwrap())
            .chain(std::iter::once("garbage".to_string()))
            .collect();
        let validation = ValidationSet::new(lines.join("\n").into());

        let evaluation = trainer.evaluate(&artifact, &validation).unwrap();
        assert_eq!(evaluation.samples, 2);
        assert_eq!(evaluation.accuracy, 1.0);
    }

    #[test]
    fn test_rejects_corrupt_artifact() {
        let result = CentroidPredictor.predict(b"not json", &BitGrid::sample());
        assert!(matches!(result, Err(DomainError::Model { .. })));
    }
}
