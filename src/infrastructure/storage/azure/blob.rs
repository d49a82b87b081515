//! Blob service client

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use tracing::{debug, info};

use super::client::StorageHttpClient;
use super::xml;
use crate::domain::storage::BlobStore;
use crate::domain::DomainError;

/// `BlobStore` over one container of a storage account
#[derive(Debug, Clone)]
pub struct AzureBlobStore {
    client: StorageHttpClient,
    container: String,
}

impl AzureBlobStore {
    pub fn new(client: StorageHttpClient, container: impl Into<String>) -> Self {
        Self {
            client,
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn get(&self, key: &str) -> Result<Bytes, DomainError> {
        let url = self.client.url(&[&self.container, key], &[]);
        let response = self
            .client
            .send(Method::GET, url, &[], Bytes::new())
            .await
            .map_err(|e| match e {
                DomainError::MissingResource { .. } => DomainError::missing_resource(key),
                other => other,
            })?;

        response
            .bytes()
            .await
            .map_err(|e| DomainError::transient_io(format!("Failed to read blob '{}': {}", key, e)))
    }

    async fn put(&self, key: &str, data: Bytes, overwrite: bool) -> Result<(), DomainError> {
        let url = self.client.url(&[&self.container, key], &[]);
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let mut headers = vec![
            ("x-ms-blob-type", "BlockBlob".to_string()),
            ("content-type", content_type),
        ];
        if !overwrite {
            headers.push(("if-none-match", "*".to_string()));
        }

        let size = data.len();
        self.client
            .send(Method::PUT, url, &headers, data)
            .await
            .map_err(|e| match e {
                DomainError::Conflict { .. } => {
                    DomainError::conflict(format!("Blob '{}' already exists", key))
                }
                other => other,
            })?;

        debug!(key = %key, size, "Uploaded blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let url = self.client.url(&[&self.container, key], &[]);

        match self.client.send(Method::DELETE, url, &[], Bytes::new()).await {
            Ok(_) => Ok(true),
            Err(DomainError::MissingResource { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("restype", "container"), ("comp", "list"), ("prefix", prefix)];
            if let Some(m) = marker.as_deref() {
                query.push(("marker", m));
            }

            let url = self.client.url(&[&self.container], &query);
            let body = self
                .client
                .send(Method::GET, url, &[], Bytes::new())
                .await?
                .text()
                .await
                .map_err(|e| DomainError::transient_io(format!("Failed to read listing: {}", e)))?;

            let (page, next) = xml::parse_blob_list(&body);
            names.extend(page);

            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(names)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let url = self.client.url(&[&self.container, key], &[]);

        match self.client.send(Method::HEAD, url, &[], Bytes::new()).await {
            Ok(_) => Ok(true),
            Err(DomainError::MissingResource { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn ensure_container(&self) -> Result<bool, DomainError> {
        let url = self.client.url(&[&self.container], &[("restype", "container")]);

        match self.client.send(Method::PUT, url, &[], Bytes::new()).await {
            Ok(response) => {
                let created = response.status() == StatusCode::CREATED;
                if created {
                    info!(container = %self.container, "Created blob container");
                }
                Ok(created)
            }
            Err(DomainError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
