//! Bounded LRU cache of model artifacts

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use lru::LruCache;
use tracing::debug;

use crate::domain::{DomainError, ModelVersion};
use crate::infrastructure::observability::{record_cache_eviction, record_cache_lookup};
use crate::infrastructure::services::ModelVersionStore;

/// Default number of artifacts kept in memory
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// Version-keyed artifact cache with least-recently-used eviction
///
/// The lock is never held across a store fetch. Two concurrent misses for the
/// same version may both fetch; the second insert only refreshes recency.
#[derive(Debug)]
pub struct ModelCache {
    store: ModelVersionStore,
    entries: Mutex<LruCache<ModelVersion, Bytes>>,
    capacity: NonZeroUsize,
}

impl ModelCache {
    pub fn new(store: ModelVersionStore, capacity: usize) -> Result<Self, DomainError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| DomainError::configuration("Model cache capacity must be positive"))?;

        Ok(Self {
            store,
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        })
    }

    pub fn store(&self) -> &ModelVersionStore {
        &self.store
    }

    /// Artifact bytes of a version, fetched from the store on a miss
    pub async fn get(&self, version: ModelVersion) -> Result<Bytes, DomainError> {
        let cached = self.lock()?.get(&version).cloned();

        if let Some(bytes) = cached {
            record_cache_lookup(true);
            debug!(version = %version, "Model cache hit");
            return Ok(bytes);
        }

        record_cache_lookup(false);
        debug!(version = %version, "Model cache miss");

        let bytes = self.store.load(version).await?;
        self.insert(version, bytes.clone())?;

        Ok(bytes)
    }

    /// Inserts or refreshes an entry, evicting the least recently used one
    /// when full
    pub fn insert(&self, version: ModelVersion, bytes: Bytes) -> Result<(), DomainError> {
        let evicted = self.lock()?.push(version, bytes);

        if let Some((evicted, _)) = evicted.filter(|(v, _)| *v != version) {
            record_cache_eviction();
            debug!(version = %evicted, "Evicted model from cache");
        }

        Ok(())
    }

    pub fn contains(&self, version: ModelVersion) -> bool {
        self.lock().map(|e| e.contains(&version)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<ModelVersion, Bytes>>, DomainError> {
        self.entries
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to acquire cache lock: {}", e)))
    }
}
