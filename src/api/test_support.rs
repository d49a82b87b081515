//! Fixtures shared by handler tests

use std::sync::Arc;

use bytes::Bytes;

use crate::domain::{ArtifactNaming, BitGrid, LabelSet, Sample, SampleCodec, Trainer, TrainingBatch};
use crate::infrastructure::cache::ModelCache;
use crate::infrastructure::ml::{CentroidPredictor, CentroidTrainer};
use crate::infrastructure::services::{ModelVersionStore, PredictionService};
use crate::infrastructure::storage::InMemoryBlobStore;

use super::state::AppState;

pub fn filled(value: bool) -> BitGrid {
    let mut grid = BitGrid::sample();
    for x in 0..grid.width() {
        for y in 0..grid.height() {
            grid.set(x, y, value);
        }
    }
    grid
}

/// Centroid model where a white canvas is "hello" and a black one "world"
pub fn trained_artifact() -> Vec<u8> {
    let codec = SampleCodec::new(LabelSet::hello_world());
    let labels = codec.labels().clone();
    let batch: TrainingBatch = vec![
        Sample::labeled(filled(true), labels.label(1).unwrap()),
        Sample::labeled(filled(false), labels.label(0).unwrap()),
    ]
    .into_iter()
    .collect();

    CentroidTrainer::new(codec).fit(&[], &batch).unwrap()
}

pub fn state_with(blobs: Arc<InMemoryBlobStore>) -> AppState {
    let store = ModelVersionStore::new(blobs, ArtifactNaming::new("model", "json").unwrap());
    let cache = Arc::new(ModelCache::new(store, 5).unwrap());
    let service = PredictionService::new(
        cache,
        Arc::new(CentroidPredictor),
        SampleCodec::new(LabelSet::hello_world()),
    );
    AppState::new(Arc::new(service))
}

pub fn published_state() -> AppState {
    state_with(Arc::new(InMemoryBlobStore::with_blobs([(
        "models/model_1713867925.json",
        Bytes::from(trained_artifact()),
    )])))
}

pub fn empty_state() -> AppState {
    state_with(Arc::new(InMemoryBlobStore::new()))
}
