//! Sample domain - labeled bitmaps and their transport forms

mod bitmap;
mod codec;
mod label;
mod message;

pub use bitmap::{BitGrid, SAMPLE_HEIGHT, SAMPLE_WIDTH};
pub use codec::SampleCodec;
pub use label::{Label, LabelSet};
pub use message::{MessageScheme, SampleEnvelope, TransportMessage};

/// A bitmap with an optional class label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub grid: BitGrid,
    pub label: Option<Label>,
}

impl Sample {
    pub fn new(grid: BitGrid, label: Option<Label>) -> Self {
        Self { grid, label }
    }

    pub fn labeled(grid: BitGrid, label: Label) -> Self {
        Self {
            grid,
            label: Some(label),
        }
    }
}

/// Where a drained sample came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRef {
    pub message_id: String,
    /// Blob holding the image, for envelope messages
    pub image_name: Option<String>,
}
