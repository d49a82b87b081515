//! Pipeline services

mod prediction_service;
mod training_coordinator;
mod version_store;

pub use prediction_service::PredictionService;
pub use training_coordinator::{
    CoordinatorSettings, CoordinatorState, CycleOutcome, TrainingCoordinator,
};
pub use version_store::ModelVersionStore;
