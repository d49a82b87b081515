//! Retrain Pipeline
//!
//! Labeled drawing samples arrive through a storage queue, a coordinator
//! periodically folds them into a new model version, and an HTTP API serves
//! predictions from the newest published version:
//! - Blob and queue clients (in-memory, or Azure Storage REST with shared
//!   key or ambient credentials)
//! - Queue draining with per-message failure handling
//! - Versioned model artifacts with an LRU artifact cache
//! - Prediction API with Prometheus metrics

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::state::AppState;
use domain::{Clock, DomainError, SampleCodec};
use infrastructure::{
    cache::ModelCache,
    ingestion::QueueDrainer,
    ml::{CentroidPredictor, CentroidTrainer},
    services::{ModelVersionStore, PredictionService, TrainingCoordinator},
    storage::{StorageClients, StorageFactory},
};
use tracing::info;

/// Services of one deployment, built once from configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    storage: StorageClients,
    codec: SampleCodec,
    cache: Arc<ModelCache>,
}

impl Pipeline {
    /// Validates the configuration and connects the configured storage
    pub fn from_config(config: AppConfig) -> Result<Self, DomainError> {
        config.validate()?;
        let storage = StorageFactory::create(&config.storage)?;
        Self::with_storage(config, storage)
    }

    /// Builds the services over already constructed storage clients
    pub fn with_storage(config: AppConfig, storage: StorageClients) -> Result<Self, DomainError> {
        let codec = config.pipeline.codec()?;
        let store = ModelVersionStore::new(storage.blobs.clone(), config.pipeline.naming()?);
        let cache = Arc::new(ModelCache::new(store, config.pipeline.cache_capacity)?);

        info!(
            classes = ?codec.labels().names(),
            model_prefix = %config.pipeline.model_prefix,
            cache_capacity = config.pipeline.cache_capacity,
            "Pipeline configured"
        );

        Ok(Self {
            config,
            storage,
            codec,
            cache,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageClients {
        &self.storage
    }

    pub fn codec(&self) -> &SampleCodec {
        &self.codec
    }

    pub fn version_store(&self) -> &ModelVersionStore {
        self.cache.store()
    }

    pub fn prediction_service(&self) -> PredictionService {
        PredictionService::new(
            self.cache.clone(),
            Arc::new(CentroidPredictor),
            self.codec.clone(),
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(Arc::new(self.prediction_service()))
    }

    pub fn drainer(&self) -> QueueDrainer {
        QueueDrainer::new(
            self.storage.queue.clone(),
            self.storage.blobs.clone(),
            self.codec.clone(),
            self.config.pipeline.message_scheme,
        )
    }

    /// Coordinator sharing this pipeline's cache, with the validation set loaded
    pub async fn coordinator(&self, clock: Arc<dyn Clock>) -> Result<TrainingCoordinator, DomainError> {
        let validation = match &self.config.pipeline.validation_key {
            Some(key) => TrainingCoordinator::load_validation(self.storage.blobs.as_ref(), key).await?,
            None => None,
        };

        Ok(TrainingCoordinator::new(
            self.storage.queue.clone(),
            self.drainer(),
            self.cache.clone(),
            Arc::new(CentroidTrainer::new(self.codec.clone())),
            clock,
            self.config.pipeline.coordinator_settings(),
        )
        .with_validation(validation))
    }
}
