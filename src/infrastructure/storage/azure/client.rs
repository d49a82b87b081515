//! Signed HTTP transport shared by the blob and queue clients

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{Method, Response, StatusCode, Url};
use tracing::debug;

use super::credential::RequestAuthorizer;
use crate::domain::DomainError;

/// REST API version sent with every request
pub const API_VERSION: &str = "2021-08-06";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client bound to one storage service endpoint
#[derive(Debug, Clone)]
pub struct StorageHttpClient {
    http: reqwest::Client,
    endpoint: Url,
    authorizer: Arc<dyn RequestAuthorizer>,
}

impl StorageHttpClient {
    pub fn new(endpoint: &str, authorizer: Arc<dyn RequestAuthorizer>) -> Result<Self, DomainError> {
        Self::with_timeout(endpoint, authorizer, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        authorizer: Arc<dyn RequestAuthorizer>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| {
            DomainError::configuration(format!("Invalid storage endpoint '{}': {}", endpoint, e))
        })?;

        if endpoint.cannot_be_a_base() {
            return Err(DomainError::configuration(format!(
                "Storage endpoint '{}' is not a base URL",
                endpoint
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            authorizer,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint URL extended by path segments; a segment containing `/` is
    /// split so blob names keep their virtual directories
    pub fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.endpoint.clone();

        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.extend(segment.split('/'));
            }
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }

        url
    }

    /// Signs and sends a request; non-success statuses become domain errors
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        headers: &[(&str, String)],
        body: Bytes,
    ) -> Result<Response, DomainError> {
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header("x-ms-date", rfc1123_now())
            .header("x-ms-version", API_VERSION)
            .header(CONTENT_LENGTH, body.len())
            .body(body)
            .build()
            .map_err(|e| DomainError::internal(format!("Failed to build request: {}", e)))?;

        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| DomainError::internal(format!("Invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| DomainError::internal(format!("Invalid header value: {}", e)))?;
            request.headers_mut().insert(name, value);
        }

        self.authorizer.authorize(&mut request).await?;

        debug!(method = %method, path = url.path(), "Sending storage request");

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| DomainError::transient_io(format!("{} {} failed: {}", method, url.path(), e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, url.path(), &body))
    }
}

fn rfc1123_now() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn status_error(status: StatusCode, path: &str, body: &str) -> DomainError {
    match status {
        StatusCode::NOT_FOUND => DomainError::missing_resource(path),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            DomainError::conflict(format!("{} already exists (HTTP {})", path, status.as_u16()))
        }
        _ => DomainError::transient_io(format!("HTTP {} for {}: {}", status, path, body)),
    }
}
