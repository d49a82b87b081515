//! In-memory blob store and message queue

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::domain::storage::{BlobStore, MessageQueue, QueueMessage};
use crate::domain::DomainError;

/// Thread-safe in-memory blob store
///
/// Useful for testing and development. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    /// Creates a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with blobs
    pub fn with_blobs<I, K>(blobs: I) -> Self
    where
        I: IntoIterator<Item = (K, Bytes)>,
        K: Into<String>,
    {
        Self {
            blobs: RwLock::new(blobs.into_iter().map(|(k, v)| (k.into(), v)).collect()),
        }
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Bytes, DomainError> {
        let blobs = self.blobs.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        blobs
            .get(key)
            .cloned()
            .ok_or_else(|| DomainError::missing_resource(key))
    }

    async fn put(&self, key: &str, data: Bytes, overwrite: bool) -> Result<(), DomainError> {
        let mut blobs = self.blobs.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire write lock: {}", e))
        })?;

        if !overwrite && blobs.contains_key(key) {
            return Err(DomainError::conflict(format!(
                "Blob '{}' already exists",
                key
            )));
        }

        blobs.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut blobs = self.blobs.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(blobs.remove(key).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        let blobs = self.blobs.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let blobs = self.blobs.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(blobs.contains_key(key))
    }

    async fn ensure_container(&self) -> Result<bool, DomainError> {
        Ok(false)
    }
}

#[derive(Debug)]
struct StoredMessage {
    id: String,
    content: String,
    pop_receipt: Option<String>,
    visible_at: Instant,
    dequeue_count: u32,
}

/// In-memory queue with visibility-timeout redelivery
#[derive(Debug)]
pub struct InMemoryMessageQueue {
    messages: Mutex<VecDeque<StoredMessage>>,
    visibility_timeout: Duration,
}

impl Default for InMemoryMessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMessageQueue {
    /// Creates a queue with a 30 second visibility timeout
    pub fn new() -> Self {
        Self::with_visibility_timeout(Duration::from_secs(30))
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            visibility_timeout,
        }
    }

    /// Makes every received-but-unacknowledged message visible again,
    /// as if its visibility timeout had lapsed
    pub fn expire_visibility(&self) {
        if let Ok(mut messages) = self.messages.lock() {
            let now = Instant::now();
            for message in messages.iter_mut() {
                message.visible_at = now;
            }
        }
    }

    /// Number of messages a receiver could get right now
    pub fn visible_len(&self) -> usize {
        let now = Instant::now();
        self.messages
            .lock()
            .map(|m| m.iter().filter(|msg| msg.visible_at <= now).count())
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<StoredMessage>>, DomainError> {
        self.messages
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to acquire queue lock: {}", e)))
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn send(&self, content: &str) -> Result<(), DomainError> {
        self.lock()?.push_back(StoredMessage {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            pop_receipt: None,
            visible_at: Instant::now(),
            dequeue_count: 0,
        });
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> Result<Vec<QueueMessage>, DomainError> {
        let mut messages = self.lock()?;
        let now = Instant::now();
        let mut received = Vec::new();

        for message in messages.iter_mut() {
            if received.len() >= max_messages {
                break;
            }

            if message.visible_at > now {
                continue;
            }

            let receipt = Uuid::new_v4().to_string();
            message.pop_receipt = Some(receipt.clone());
            message.visible_at = now + self.visibility_timeout;
            message.dequeue_count += 1;

            received.push(QueueMessage {
                id: message.id.clone(),
                pop_receipt: receipt,
                content: message.content.clone(),
                dequeue_count: message.dequeue_count,
            });
        }

        Ok(received)
    }

    async fn delete(&self, message: &QueueMessage) -> Result<(), DomainError> {
        let mut messages = self.lock()?;

        let position = messages.iter().position(|m| {
            m.id == message.id && m.pop_receipt.as_deref() == Some(message.pop_receipt.as_str())
        });

        match position {
            Some(index) => {
                messages.remove(index);
                Ok(())
            }
            None => Err(DomainError::missing_resource(format!(
                "message {}",
                message.id
            ))),
        }
    }

    async fn approximate_len(&self) -> Result<usize, DomainError> {
        Ok(self.lock()?.len())
    }

    async fn ensure_queue(&self) -> Result<bool, DomainError> {
        Ok(false)
    }
}
