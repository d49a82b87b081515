//! Storage domain - blob and queue capabilities consumed by the pipeline

mod blob;
mod queue;

pub use blob::BlobStore;
pub use queue::{MessageQueue, QueueMessage};

#[cfg(test)]
pub use blob::MockBlobStore;
#[cfg(test)]
pub use queue::MockMessageQueue;
