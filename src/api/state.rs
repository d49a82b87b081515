//! Application state shared by handlers

use std::sync::Arc;

use crate::infrastructure::services::PredictionService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub prediction: Arc<PredictionService>,
}

impl AppState {
    pub fn new(prediction: Arc<PredictionService>) -> Self {
        Self { prediction }
    }
}
