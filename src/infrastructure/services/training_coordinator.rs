//! Training coordinator - the polling retrain loop
//!
//! One cycle checks the backlog, drains the queue, fits a new artifact on top
//! of the latest model and publishes it under the current Unix time. Exactly
//! one coordinator may run against a deployment; nothing here enforces that.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::domain::{
    BlobStore, Clock, DomainError, Evaluation, MessageQueue, ModelVersion, Trainer,
    TrainingBatch, ValidationSet,
};
use crate::infrastructure::cache::ModelCache;
use crate::infrastructure::ingestion::QueueDrainer;
use crate::infrastructure::observability::{record_model_published, record_training_cycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Checking,
    Training,
    Publishing,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::Training => "training",
            Self::Publishing => "publishing",
        };
        write!(f, "{}", name)
    }
}

/// Result of one completed cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Backlog at or below the threshold
    Waiting { backlog: usize },
    /// Backlog reported, but the drain produced no samples
    EmptyBatch,
    Published {
        version: ModelVersion,
        base: ModelVersion,
        samples: usize,
        evaluation: Option<Evaluation>,
    },
}

impl CycleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting { .. } => "idle",
            Self::EmptyBatch => "empty",
            Self::Published { .. } => "published",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub poll_interval: Duration,
    /// Training starts only when the backlog exceeds this
    pub backlog_threshold: usize,
    pub batch_limit: usize,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            backlog_threshold: 1,
            batch_limit: 32,
        }
    }
}

pub struct TrainingCoordinator {
    queue: Arc<dyn MessageQueue>,
    drainer: QueueDrainer,
    cache: Arc<ModelCache>,
    trainer: Arc<dyn Trainer>,
    clock: Arc<dyn Clock>,
    settings: CoordinatorSettings,
    validation: Option<ValidationSet>,
    state: CoordinatorState,
}

impl fmt::Debug for TrainingCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingCoordinator")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("has_validation", &self.validation.is_some())
            .finish_non_exhaustive()
    }
}

impl TrainingCoordinator {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        drainer: QueueDrainer,
        cache: Arc<ModelCache>,
        trainer: Arc<dyn Trainer>,
        clock: Arc<dyn Clock>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            queue,
            drainer,
            cache,
            trainer,
            clock,
            settings,
            validation: None,
            state: CoordinatorState::Idle,
        }
    }

    pub fn with_validation(mut self, validation: Option<ValidationSet>) -> Self {
        self.validation = validation;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    /// Reads the validation asset; a missing blob only disables evaluation
    pub async fn load_validation(
        blobs: &dyn BlobStore,
        key: &str,
    ) -> Result<Option<ValidationSet>, DomainError> {
        match blobs.get(key).await {
            Ok(bytes) if std::str::from_utf8(&bytes).is_err() => {
                warn!(key = %key, size = bytes.len(), "Validation set is not newline-separated encoded samples, evaluation disabled");
                Ok(None)
            }
            Ok(bytes) => {
                info!(key = %key, size = bytes.len(), "Loaded validation set");
                Ok(Some(ValidationSet::new(bytes)))
            }
            Err(DomainError::MissingResource { .. }) => {
                warn!(key = %key, "Validation set not found, evaluation disabled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Fails with a configuration error when no model has been seeded
    pub async fn ensure_seeded(&self) -> Result<ModelVersion, DomainError> {
        match self.cache.store().latest().await {
            Ok(version) => {
                info!(version = %version, "Found base model");
                Ok(version)
            }
            Err(DomainError::NoVersions { prefix }) => Err(DomainError::configuration(format!(
                "No model found under '{}'; upload a seed model first",
                prefix
            ))),
            Err(e) => Err(e),
        }
    }

    /// Polls until `shutdown` resolves or a fatal error occurs
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), DomainError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            poll_interval_secs = self.settings.poll_interval.as_secs_f64(),
            backlog_threshold = self.settings.backlog_threshold,
            batch_limit = self.settings.batch_limit,
            "Training coordinator started"
        );

        loop {
            let started = Instant::now();

            match self.run_cycle().await {
                Ok(outcome) => record_training_cycle(outcome.as_str(), started.elapsed()),
                Err(e) if e.is_fatal() => {
                    error!(error = %e, kind = e.kind(), "Training loop stopped");
                    record_training_cycle("error", started.elapsed());
                    return Err(e);
                }
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "Training cycle failed, retrying next poll");
                    record_training_cycle("error", started.elapsed());
                }
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Training coordinator shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }
    }

    /// Runs one Checking → Training → Publishing pass; always ends Idle
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, DomainError> {
        let result = self.cycle().await;
        self.transition(CoordinatorState::Idle);
        result
    }

    async fn cycle(&mut self) -> Result<CycleOutcome, DomainError> {
        self.transition(CoordinatorState::Checking);

        let backlog = self.queue.approximate_len().await?;
        if backlog <= self.settings.backlog_threshold {
            info!(backlog, threshold = self.settings.backlog_threshold, "Waiting for more samples");
            return Ok(CycleOutcome::Waiting { backlog });
        }

        self.transition(CoordinatorState::Training);

        let base = self.cache.store().latest().await?;
        let base_artifact = self.cache.get(base).await?;

        let drained = self.drainer.drain(self.settings.batch_limit).await?;
        if drained.is_empty() {
            info!(backlog, "Backlog reported but nothing was drained");
            return Ok(CycleOutcome::EmptyBatch);
        }

        let batch: TrainingBatch = drained.into_iter().map(|(sample, _)| sample).collect();
        let samples = batch.len();
        info!(base = %base, samples, "Training new model");

        let (artifact, evaluation) = self.train(base_artifact, batch).await.inspect_err(|e| {
            error!(error = %e, lost_samples = samples, "Training failed after the batch was acknowledged");
        })?;

        self.transition(CoordinatorState::Publishing);

        let version = ModelVersion::new(self.clock.now_unix_seconds())?;
        if version < base {
            warn!(version = %version, latest = %base, "Clock is behind the latest version; the new model will not become latest");
        }

        let artifact = Bytes::from(artifact);
        self.cache.store().publish(version, artifact.clone()).await?;
        self.cache.insert(version, artifact)?;

        record_model_published(version.as_u64(), samples);
        info!(version = %version, iso = %version.to_iso(), samples, "Model published");

        Ok(CycleOutcome::Published {
            version,
            base,
            samples,
            evaluation,
        })
    }

    async fn train(
        &self,
        base: Bytes,
        batch: TrainingBatch,
    ) -> Result<(Vec<u8>, Option<Evaluation>), DomainError> {
        let trainer = self.trainer.clone();
        let validation = self.validation.clone();

        tokio::task::spawn_blocking(move || {
            let artifact = trainer.fit(&base, &batch)?;

            let evaluation = match validation {
                Some(validation) => match trainer.evaluate(&artifact, &validation) {
                    Ok(evaluation) => {
                        info!(
                            samples = evaluation.samples,
                            accuracy = evaluation.accuracy,
                            "Evaluated new model"
                        );
                        Some(evaluation)
                    }
                    Err(e) => {
                        warn!(error = %e, "Evaluation failed");
                        None
                    }
                },
                None => None,
            };

            Ok((artifact, evaluation))
        })
        .await
        .map_err(|e| DomainError::internal(format!("Training task failed: {}", e)))?
    }

    fn transition(&mut self, next: CoordinatorState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "Coordinator state change");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::storage::MockMessageQueue;
    use crate::domain::{
        ArtifactNaming, BitGrid, LabelSet, ManualClock, MessageScheme, SampleCodec, SampleEnvelope,
        TransportMessage,
    };
    use crate::infrastructure::ingestion::encode_png;
    use crate::infrastructure::ml::{CentroidModel, CentroidTrainer};
    use crate::infrastructure::services::ModelVersionStore;
    use crate::infrastructure::storage::{InMemoryBlobStore, InMemoryMessageQueue};

    struct Fixture {
        blobs: Arc<InMemoryBlobStore>,
        queue: Arc<InMemoryMessageQueue>,
        clock: Arc<ManualClock>,
        coordinator: TrainingCoordinator,
    }

    fn codec() -> SampleCodec {
        SampleCodec::new(LabelSet::hello_world())
    }

    async fn fixture(seed: bool) -> Fixture {
        let blobs = Arc::new(InMemoryBlobStore::new());
        if seed {
            let seed = CentroidModel::empty(2).to_bytes().unwrap();
            blobs
                .put("models/model_1000.json", Bytes::from(seed), false)
                .await
                .unwrap();
        }

        let queue = Arc::new(InMemoryMessageQueue::new());
        let clock = Arc::new(ManualClock::new(2000));
        let store = ModelVersionStore::new(blobs.clone(), ArtifactNaming::new("model", "json").unwrap());
        let cache = Arc::new(ModelCache::new(store, 5).unwrap());
        let drainer = QueueDrainer::new(queue.clone(), blobs.clone(), codec(), MessageScheme::Envelope);

        let coordinator = TrainingCoordinator::new(
            queue.clone(),
            drainer,
            cache,
            Arc::new(CentroidTrainer::new(codec())),
            clock.clone(),
            CoordinatorSettings::default(),
        );

        Fixture {
            blobs,
            queue,
            clock,
            coordinator,
        }
    }

    async fn submit(fixture: &Fixture, name: &str, label: i64) {
        let png = encode_png(&BitGrid::sample()).unwrap();
        fixture
            .blobs
            .put(name, Bytes::from(png), false)
            .await
            .unwrap();
        let text = TransportMessage::Envelope(SampleEnvelope::new(name, Some(label)))
            .to_text()
            .unwrap();
        fixture.queue.send(&text).await.unwrap();
    }

    #[tokio::test]
    async fn test_waits_at_or_below_threshold() {
        let mut f = fixture(true).await;
        submit(&f, "a.png", 1).await;

        let outcome = f.coordinator.run_cycle().await.unwrap();
        assert_eq!(outcome, CycleOutcome::Waiting { backlog: 1 });
        assert_eq!(f.coordinator.state(), CoordinatorState::Idle);
        assert_eq!(f.queue.approximate_len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_trains_and_publishes_new_latest() {
        let mut f = fixture(true).await;
        submit(&f, "a.png", 1).await;
        submit(&f, "b.png", 0).await;

        let outcome = f.coordinator.run_cycle().await.unwrap();
        match outcome {
            CycleOutcome::Published {
                version,
                base,
                samples,
                evaluation,
            } => {
                assert_eq!(version.as_u64(), 2000);
                assert_eq!(base.as_u64(), 1000);
                assert_eq!(samples, 2);
                assert!(evaluation.is_none());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(f.queue.approximate_len().await.unwrap(), 0);
        assert!(f.coordinator.cache.contains(ModelVersion::new(2000).unwrap()));

        let artifact = f.blobs.get("models/model_2000.json").await.unwrap();
        let model = CentroidModel::from_bytes(&artifact).unwrap();
        assert_eq!(model.samples_seen(), 2);
    }

    #[tokio::test]
    async fn test_missing_seed_is_retryable_in_cycle_but_fatal_at_startup() {
        let mut f = fixture(false).await;
        submit(&f, "a.png", 1).await;
        submit(&f, "b.png", 1).await;

        let err = f.coordinator.run_cycle().await.unwrap_err();
        assert!(matches!(err, DomainError::NoVersions { .. }));
        assert!(!err.is_fatal());

        let err = f.coordinator.ensure_seeded().await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_duplicate_version_stops_the_loop() {
        let mut f = fixture(true).await;
        f.clock.set(1000);
        submit(&f, "a.png", 1).await;
        submit(&f, "b.png", 0).await;

        let result = f.coordinator.run(std::future::pending()).await;
        assert!(matches!(
            result,
            Err(DomainError::DuplicateVersion { version: 1000 })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_checked_between_cycles() {
        let mut f = fixture(true).await;
        f.coordinator.run(async {}).await.unwrap();
        assert_eq!(f.coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_transient_backlog_error_is_not_fatal() {
        let mut queue = MockMessageQueue::new();
        queue
            .expect_approximate_len()
            .returning(|| Err(DomainError::transient_io("queue unreachable")));
        let queue: Arc<dyn MessageQueue> = Arc::new(queue);

        let f = fixture(true).await;
        let mut coordinator = TrainingCoordinator::new(
            queue.clone(),
            QueueDrainer::new(queue, f.blobs.clone(), codec(), MessageScheme::Envelope),
            f.coordinator.cache.clone(),
            Arc::new(CentroidTrainer::new(codec())),
            f.clock.clone(),
            CoordinatorSettings::default(),
        );

        coordinator.run(async {}).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_validation_set_disables_evaluation() {
        let blobs = InMemoryBlobStore::new();
        let loaded = TrainingCoordinator::load_validation(&blobs, "datasets/val_data.zip")
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_binary_validation_asset_disables_evaluation() {
        let blobs = InMemoryBlobStore::with_blobs([(
            "datasets/val_data.zip",
            Bytes::from_static(b"PK\x03\x04\x14\x00\xff\xfe"),
        )]);
        let loaded = TrainingCoordinator::load_validation(&blobs, "datasets/val_data.zip")
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_evaluates_against_validation_set() {
        let codec = codec();
        let label = codec.labels().label(1).unwrap();
        let line = codec.encode(&BitGrid::sample(), Some(label)).unwrap();

        let mut f = fixture(true).await;
        f.coordinator = f
            .coordinator
            .with_validation(Some(ValidationSet::new(Bytes::from(line))));
        submit(&f, "a.png", 1).await;
        submit(&f, "b.png", 1).await;

        match f.coordinator.run_cycle().await.unwrap() {
            CycleOutcome::Published { evaluation, .. } => {
                let evaluation = evaluation.unwrap();
                assert_eq!(evaluation.samples, 1);
                assert_eq!(evaluation.accuracy, 1.0);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
