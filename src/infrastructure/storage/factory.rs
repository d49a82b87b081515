//! Storage factory for runtime backend selection

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::storage::{BlobStore, MessageQueue};
use crate::domain::DomainError;

use super::azure::{
    AmbientCredential, AzureBlobStore, AzureMessageQueue, ConnectionString, RequestAuthorizer,
    SharedKeyCredential, StorageHttpClient,
};
use super::in_memory::{InMemoryBlobStore, InMemoryMessageQueue};

/// How the process authenticates against storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialMode {
    /// Process-local stores (testing/development)
    #[default]
    #[serde(alias = "memory", alias = "in-memory", alias = "inmemory")]
    InMemory,
    /// Shared Key signing with the account key from a connection string
    #[serde(alias = "connection-string", alias = "shared_key")]
    ConnectionString,
    /// Bearer token from the hosting environment
    #[serde(alias = "managed_identity", alias = "azure")]
    Ambient,
}

impl fmt::Display for CredentialMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InMemory => "in_memory",
            Self::ConnectionString => "connection_string",
            Self::Ambient => "ambient",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CredentialMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "connection_string" | "connection-string" | "shared_key" => Ok(Self::ConnectionString),
            "ambient" | "managed_identity" | "azure" => Ok(Self::Ambient),
            other => Err(DomainError::configuration(format!(
                "Unknown credential mode '{}'",
                other
            ))),
        }
    }
}

/// Blob store and queue built for one deployment
#[derive(Debug, Clone)]
pub struct StorageClients {
    pub blobs: Arc<dyn BlobStore>,
    pub queue: Arc<dyn MessageQueue>,
}

/// Factory for creating storage clients
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates the clients selected by the configuration
    pub fn create(config: &StorageConfig) -> Result<StorageClients, DomainError> {
        let visibility = Duration::from_secs(config.visibility_timeout_secs);

        let (authorizer, blob_endpoint, queue_endpoint): (Arc<dyn RequestAuthorizer>, String, String) =
            match config.credential {
                CredentialMode::InMemory => {
                    info!("Using in-memory storage");
                    return Ok(Self::create_in_memory(visibility));
                }
                CredentialMode::ConnectionString => {
                    let raw = config.connection_string.as_deref().ok_or_else(|| {
                        DomainError::configuration("Connection string credential requires storage.connection_string")
                    })?;
                    let parsed: ConnectionString = raw.parse()?;
                    let credential =
                        SharedKeyCredential::new(parsed.account_name.clone(), &parsed.account_key)?;

                    (
                        Arc::new(credential),
                        config.blob_endpoint.clone().unwrap_or(parsed.blob_endpoint),
                        config.queue_endpoint.clone().unwrap_or(parsed.queue_endpoint),
                    )
                }
                CredentialMode::Ambient => {
                    let blob = config.blob_endpoint.clone().ok_or_else(|| {
                        DomainError::configuration("Ambient credential requires storage.blob_endpoint")
                    })?;
                    let queue = config.queue_endpoint.clone().ok_or_else(|| {
                        DomainError::configuration("Ambient credential requires storage.queue_endpoint")
                    })?;

                    (
                        Arc::new(AmbientCredential::from_env(config.identity_endpoint.clone())),
                        blob,
                        queue,
                    )
                }
            };

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let blob_client = StorageHttpClient::with_timeout(&blob_endpoint, authorizer.clone(), timeout)?;
        let queue_client = StorageHttpClient::with_timeout(&queue_endpoint, authorizer, timeout)?;

        info!(
            credential = %config.credential,
            blob_endpoint = %blob_endpoint,
            queue_endpoint = %queue_endpoint,
            container = %config.container,
            queue = %config.queue,
            "Using storage account"
        );

        Ok(StorageClients {
            blobs: Arc::new(AzureBlobStore::new(blob_client, config.container.clone())),
            queue: Arc::new(
                AzureMessageQueue::new(queue_client, config.queue.clone())
                    .with_visibility_timeout(visibility),
            ),
        })
    }

    /// Creates process-local stores
    pub fn create_in_memory(visibility_timeout: Duration) -> StorageClients {
        StorageClients {
            blobs: Arc::new(InMemoryBlobStore::new()),
            queue: Arc::new(InMemoryMessageQueue::with_visibility_timeout(visibility_timeout)),
        }
    }
}
