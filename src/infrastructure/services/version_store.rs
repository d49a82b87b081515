//! Model version store - timestamped artifacts under `models/`

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::domain::model::MODELS_DIR;
use crate::domain::{ArtifactNaming, BlobStore, DomainError, ModelVersion};

/// Maps model versions to artifacts in the blob store
#[derive(Debug, Clone)]
pub struct ModelVersionStore {
    blobs: Arc<dyn BlobStore>,
    naming: ArtifactNaming,
}

impl ModelVersionStore {
    pub fn new(blobs: Arc<dyn BlobStore>, naming: ArtifactNaming) -> Self {
        Self { blobs, naming }
    }

    pub fn naming(&self) -> &ArtifactNaming {
        &self.naming
    }

    pub fn artifact_key(&self, version: ModelVersion) -> String {
        self.naming.key(version)
    }

    /// All published versions, ascending; keys not following the naming
    /// convention are ignored
    pub async fn list(&self) -> Result<Vec<ModelVersion>, DomainError> {
        let keys = self.blobs.list(MODELS_DIR).await?;

        let mut versions: Vec<ModelVersion> = keys
            .iter()
            .filter_map(|key| self.naming.parse(key))
            .collect();
        versions.sort_unstable();
        versions.dedup();

        Ok(versions)
    }

    /// Newest published version
    pub async fn latest(&self) -> Result<ModelVersion, DomainError> {
        let latest = self
            .list()
            .await?
            .into_iter()
            .max()
            .ok_or_else(|| DomainError::no_versions(MODELS_DIR))?;

        debug!(version = %latest, "Resolved latest model version");
        Ok(latest)
    }

    /// Stores a new artifact; an existing version is never overwritten
    pub async fn publish(&self, version: ModelVersion, artifact: Bytes) -> Result<(), DomainError> {
        let key = self.artifact_key(version);

        if self.blobs.exists(&key).await? {
            return Err(DomainError::duplicate_version(version.as_u64()));
        }

        let size = artifact.len();
        self.blobs
            .put(&key, artifact, false)
            .await
            .map_err(|e| match e {
                DomainError::Conflict { .. } => DomainError::duplicate_version(version.as_u64()),
                other => other,
            })?;

        info!(version = %version, key = %key, size, "Published model version");
        Ok(())
    }

    /// Artifact bytes of a version
    pub async fn load(&self, version: ModelVersion) -> Result<Bytes, DomainError> {
        self.blobs.get(&self.artifact_key(version)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::MockBlobStore;
    use crate::infrastructure::storage::InMemoryBlobStore;

    fn version(v: u64) -> ModelVersion {
        ModelVersion::new(v).unwrap()
    }

    fn store_with(keys: &[&str]) -> ModelVersionStore {
        let blobs = InMemoryBlobStore::with_blobs(keys.iter().map(|k| (*k, Bytes::new())));
        ModelVersionStore::new(Arc::new(blobs), ArtifactNaming::new("m", "ext").unwrap())
    }

    #[tokio::test]
    async fn test_latest_is_max_version() {
        let store = store_with(&["models/m_100.ext", "models/m_300.ext", "models/m_200.ext"]);
        assert_eq!(store.latest().await.unwrap(), version(300));
    }

    #[tokio::test]
    async fn test_latest_ignores_foreign_keys() {
        let store = store_with(&[
            "models/m_100.ext",
            "models/m_999.other",
            "models/other_500.ext",
            "models/readme.txt",
            "datasets/val_data.zip",
        ]);
        assert_eq!(store.latest().await.unwrap(), version(100));
        assert_eq!(store.list().await.unwrap(), vec![version(100)]);
    }

    #[tokio::test]
    async fn test_no_versions() {
        let store = store_with(&["datasets/val_data.zip"]);
        assert!(matches!(
            store.latest().await,
            Err(DomainError::NoVersions { .. })
        ));
    }

    #[tokio::test]
    async fn test_publish_new_max_updates_latest() {
        let store = store_with(&["models/m_100.ext"]);
        store.publish(version(150), Bytes::from_static(b"new")).await.unwrap();

        assert_eq!(store.latest().await.unwrap(), version(150));
        assert_eq!(store.load(version(150)).await.unwrap(), Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_publish_existing_version_is_duplicate() {
        let store = store_with(&["models/m_100.ext"]);
        let result = store.publish(version(100), Bytes::from_static(b"x")).await;

        assert!(matches!(
            result,
            Err(DomainError::DuplicateVersion { version: 100 })
        ));
        assert_eq!(store.load(version(100)).await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn test_publish_race_maps_conflict_to_duplicate() {
        let mut blobs = MockBlobStore::new();
        blobs.expect_exists().returning(|_| Ok(false));
        blobs
            .expect_put()
            .returning(|key, _, _| Err(DomainError::conflict(format!("{} exists", key))));

        let store = ModelVersionStore::new(Arc::new(blobs), ArtifactNaming::new("m", "ext").unwrap());
        let result = store.publish(version(7), Bytes::new()).await;

        assert!(matches!(result, Err(DomainError::DuplicateVersion { version: 7 })));
    }

    #[tokio::test]
    async fn test_list_propagates_store_errors() {
        let mut blobs = MockBlobStore::new();
        blobs
            .expect_list()
            .returning(|_| Err(DomainError::transient_io("unreachable")));

        let store = ModelVersionStore::new(Arc::new(blobs), ArtifactNaming::new("m", "ext").unwrap());
        assert!(matches!(
            store.latest().await,
            Err(DomainError::TransientIo { .. })
        ));
    }
}
