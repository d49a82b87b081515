//! Prediction service - inference with the newest published model

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::domain::model::arg_max;
use crate::domain::{
    BitGrid, DomainError, ModelVersion, Prediction, Predictor, SampleCodec,
};
use crate::infrastructure::cache::ModelCache;
use crate::infrastructure::ingestion::ImageNormalizer;
use crate::infrastructure::observability::record_prediction;

/// Serves predictions from the latest model version
///
/// The latest version is resolved on every request, so a newly published
/// model is picked up without restarting.
#[derive(Clone)]
pub struct PredictionService {
    cache: Arc<ModelCache>,
    predictor: Arc<dyn Predictor>,
    codec: SampleCodec,
    normalizer: ImageNormalizer,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("cache", &self.cache)
            .field("codec", &self.codec)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    pub fn new(cache: Arc<ModelCache>, predictor: Arc<dyn Predictor>, codec: SampleCodec) -> Self {
        Self {
            cache,
            predictor,
            codec,
            normalizer: ImageNormalizer::new(),
        }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    /// Predicts the class of a PNG or JPEG image
    pub async fn predict(&self, image: &[u8]) -> Result<Prediction, DomainError> {
        let grid = self.normalizer.normalize(image)?;
        self.predict_grid(grid).await
    }

    /// Predicts from a codec string, as produced by sample submitters
    pub async fn predict_encoded(&self, encoded: &str, labeled: bool) -> Result<Prediction, DomainError> {
        let (grid, _) = self
            .codec
            .decode(encoded, labeled)
            .map_err(|e| DomainError::invalid_input(e.to_string()))?;

        self.predict_grid(grid).await
    }

    pub async fn predict_grid(&self, grid: BitGrid) -> Result<Prediction, DomainError> {
        let started = Instant::now();
        let result = self.infer(grid).await;

        let label = result
            .as_ref()
            .map(|p| p.prediction.as_str())
            .unwrap_or("none");
        record_prediction(label, result.is_ok(), started.elapsed());

        result
    }

    /// Latest version, or `ModelUnavailable` when nothing is published
    pub async fn latest_version(&self) -> Result<ModelVersion, DomainError> {
        self.cache.store().latest().await.map_err(|e| match e {
            DomainError::NoVersions { .. } => DomainError::model_unavailable("No model has been published yet"),
            other => other,
        })
    }

    async fn infer(&self, grid: BitGrid) -> Result<Prediction, DomainError> {
        let (width, height) = self.codec.size();
        if grid.width() != width || grid.height() != height {
            return Err(DomainError::invalid_input(format!(
                "Expected a {}x{} grid, got {}x{}",
                width,
                height,
                grid.width(),
                grid.height()
            )));
        }

        let version = self.latest_version().await?;
        let artifact = self.cache.get(version).await?;

        let predictor = self.predictor.clone();
        let scores = tokio::task::spawn_blocking(move || predictor.predict(&artifact, &grid))
            .await
            .map_err(|e| DomainError::internal(format!("Inference task failed: {}", e)))??;

        let probabilities = scores.into_probabilities();
        let index = arg_max(&probabilities)
            .ok_or_else(|| DomainError::model("Model returned no scores"))?;

        let labels = self.codec.labels();
        if probabilities.len() != labels.len() {
            warn!(
                scores = probabilities.len(),
                classes = labels.len(),
                "Model output does not match the configured classes"
            );
        }

        let label = labels
            .label(index as i64)
            .map_err(|_| DomainError::model(format!("Model predicted unknown class index {}", index)))?;
        let name = labels.name(label).unwrap_or_default().to_string();

        debug!(version = %version, label = %label, prediction = %name, "Prediction complete");

        Ok(Prediction::new(
            label.value(),
            probabilities[index],
            name,
            version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    use crate::domain::{ArtifactNaming, BlobStore, LabelSet, Sample, Scores, Trainer, TrainingBatch};
    use crate::infrastructure::ingestion::encode_png;
    use crate::infrastructure::ml::{CentroidPredictor, CentroidTrainer};
    use crate::infrastructure::services::ModelVersionStore;
    use crate::infrastructure::storage::InMemoryBlobStore;

    fn codec() -> SampleCodec {
        SampleCodec::new(LabelSet::hello_world())
    }

    fn service_over(blobs: Arc<InMemoryBlobStore>, predictor: Arc<dyn Predictor>) -> PredictionService {
        let store = ModelVersionStore::new(blobs, ArtifactNaming::new("model", "json").unwrap());
        let cache = Arc::new(ModelCache::new(store, 5).unwrap());
        PredictionService::new(cache, predictor, codec())
    }

    /// Ink frame around the edge so trimming keeps the whole canvas;
    /// "hello" leaves the inside white, "world" fills it
    fn drawing(hello: bool) -> BitGrid {
        let mut grid = BitGrid::sample();
        let (w, h) = (grid.width(), grid.height());
        for x in 0..w {
            for y in 0..h {
                let border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
                grid.set(x, y, hello && !border);
            }
        }
        grid
    }

    struct FixedPredictor(Vec<f32>);

    impl Predictor for FixedPredictor {
        fn predict(&self, _model: &[u8], _input: &BitGrid) -> Result<Scores, DomainError> {
            Ok(Scores::Probabilities(self.0.clone()))
        }
    }

    #[tokio::test]
    async fn test_no_versions_is_model_unavailable() {
        let service = service_over(Arc::new(InMemoryBlobStore::new()), Arc::new(CentroidPredictor));

        let result = service.predict_grid(BitGrid::sample()).await;
        assert!(matches!(result, Err(DomainError::ModelUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_predicts_with_latest_version() {
        let codec = codec();
        let labels = codec.labels().clone();
        let trainer = CentroidTrainer::new(codec);
        let batch: TrainingBatch = vec![
            Sample::labeled(drawing(true), labels.label(1).unwrap()),
            Sample::labeled(drawing(false), labels.label(0).unwrap()),
        ]
        .into_iter()
        .collect();
        let artifact = trainer.fit(&[], &batch).unwrap();

        let blobs = Arc::new(InMemoryBlobStore::with_blobs([
            ("models/model_100.json", Bytes::from(trainer.fit(&[], &TrainingBatch::new()).unwrap())),
            ("models/model_1713867925.json", Bytes::from(artifact)),
        ]));
        let service = service_over(blobs, Arc::new(CentroidPredictor));

        let png = encode_png(&drawing(true)).unwrap();
        let prediction = service.predict(&png).await.unwrap();

        assert_eq!(prediction.label, 1);
        assert_eq!(prediction.prediction, "hello");
        assert_eq!(prediction.version, 1713867925);
        assert_eq!(prediction.version_iso, "2024-04-23T10:25:25");
        assert!(prediction.confidence > 0.5 && prediction.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_new_publish_is_picked_up() {
        let blobs = Arc::new(InMemoryBlobStore::with_blobs([(
            "models/model_100.json",
            Bytes::new(),
        )]));
        let service = service_over(blobs.clone(), Arc::new(FixedPredictor(vec![0.2, 0.8])));

        assert_eq!(service.predict_grid(BitGrid::sample()).await.unwrap().version, 100);

        blobs
            .put("models/model_200.json", Bytes::new(), false)
            .await
            .unwrap();
        assert_eq!(service.predict_grid(BitGrid::sample()).await.unwrap().version, 200);
        assert_eq!(service.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_encoded_input() {
        let blobs = Arc::new(InMemoryBlobStore::with_blobs([(
            "models/model_5.json",
            Bytes::new(),
        )]));
        let service = service_over(blobs, Arc::new(FixedPredictor(vec![0.9, 0.1])));

        let encoded = codec().encode(&drawing(false), None).unwrap();
        let prediction = service.predict_encoded(&encoded, false).await.unwrap();
        assert_eq!(prediction.prediction, "world");
        assert!((prediction.confidence - 0.9).abs() < 1e-6);

        let result = service.predict_encoded("%%%", false).await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_unsupported_image_is_invalid_input() {
        let service = service_over(Arc::new(InMemoryBlobStore::new()), Arc::new(CentroidPredictor));

        let result = service.predict(b"GIF89a").await;
        assert!(matches!(result, Err(DomainError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_out_of_range_class_is_model_error() {
        let blobs = Arc::new(InMemoryBlobStore::with_blobs([(
            "models/model_5.json",
            Bytes::new(),
        )]));
        let service = service_over(blobs, Arc::new(FixedPredictor(vec![0.1, 0.1, 0.8])));

        let result = service.predict_grid(BitGrid::sample()).await;
        assert!(matches!(result, Err(DomainError::Model { .. })));
    }
}
