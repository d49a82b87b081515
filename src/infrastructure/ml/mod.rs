//! Reference model implementations

mod centroid;

pub use centroid::{CentroidModel, CentroidPredictor, CentroidTrainer, ClassCentroid};
