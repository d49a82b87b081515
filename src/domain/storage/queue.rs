//! Message queue capability

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// A received message; deleting it requires the receipt from this delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub id: String,
    pub pop_receipt: String,
    pub content: String,
    pub dequeue_count: u32,
}

/// At-least-once message channel with explicit acknowledgement
///
/// Received messages stay invisible to other receivers for a visibility
/// timeout and reappear unless deleted before it elapses.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync + Debug {
    /// Enqueues a message
    async fn send(&self, content: &str) -> Result<(), DomainError>;

    /// Receives up to `max_messages` visible messages
    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>, DomainError>;

    /// Acknowledges a message received earlier
    async fn delete(&self, message: &QueueMessage) -> Result<(), DomainError>;

    /// Approximate number of messages in the queue, visible or not
    async fn approximate_len(&self) -> Result<usize, DomainError>;

    /// Creates the queue, returns false if it already existed
    async fn ensure_queue(&self) -> Result<bool, DomainError>;
}
