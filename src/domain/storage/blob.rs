//! Blob store capability

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// Named byte storage inside a single container
///
/// Implementations report an absent key as `DomainError::MissingResource` and
/// any service or network failure as `DomainError::TransientIo`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync + Debug {
    /// Downloads the bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Bytes, DomainError>;

    /// Uploads bytes; with `overwrite == false` an existing key yields `Conflict`
    async fn put(&self, key: &str, data: Bytes, overwrite: bool) -> Result<(), DomainError>;

    /// Deletes a blob, returns false if it did not exist
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Lists keys starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError>;

    /// Checks whether a key exists
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(DomainError::MissingResource { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates the backing container, returns false if it already existed
    async fn ensure_container(&self) -> Result<bool, DomainError>;
}
