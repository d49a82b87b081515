//! Request authorization for the storage REST services
//!
//! Two interchangeable strategies, picked once at startup:
//! - `SharedKeyCredential` signs each request with the account key from a
//!   connection string
//! - `AmbientCredential` attaches a bearer token from the environment or the
//!   instance metadata endpoint

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::DomainError;

type HmacSha256 = Hmac<Sha256>;

/// Storage resource the ambient token is requested for
const STORAGE_RESOURCE: &str = "https://storage.azure.com/";

/// Instance metadata service token endpoint
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Refresh tokens this many seconds before they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

/// Adds credentials to an outgoing storage request
#[async_trait]
pub trait RequestAuthorizer: Send + Sync + Debug {
    async fn authorize(&self, request: &mut reqwest::Request) -> Result<(), DomainError>;
}

/// Shared Key request signing
pub struct SharedKeyCredential {
    account_name: String,
    key: Vec<u8>,
}

impl Debug for SharedKeyCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeyCredential")
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}

impl SharedKeyCredential {
    pub fn new(account_name: impl Into<String>, account_key: &str) -> Result<Self, DomainError> {
        let key = STANDARD.decode(account_key.trim()).map_err(|e| {
            DomainError::configuration(format!("Account key is not valid base64: {}", e))
        })?;

        Ok(Self {
            account_name: account_name.into(),
            key,
        })
    }

    /// Canonical string the signature is computed over
    pub(crate) fn string_to_sign(&self, request: &reqwest::Request) -> String {
        let headers = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        let content_length = match header("content-length").as_str() {
            "0" => String::new(),
            other => other.to_string(),
        };

        let mut canonical_headers: Vec<(String, String)> = headers
            .iter()
            .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or("").trim().to_string(),
                )
            })
            .collect();
        canonical_headers.sort();

        let mut lines = vec![
            request.method().as_str().to_string(),
            header("content-encoding"),
            header("content-language"),
            content_length,
            header("content-md5"),
            header("content-type"),
            header("date"),
            header("if-modified-since"),
            header("if-match"),
            header("if-none-match"),
            header("if-unmodified-since"),
            header("range"),
        ];

        lines.extend(
            canonical_headers
                .into_iter()
                .map(|(name, value)| format!("{}:{}", name, value)),
        );
        lines.push(self.canonical_resource(request.url()));

        lines.join("\n")
    }

    fn canonical_resource(&self, url: &reqwest::Url) -> String {
        let mut resource = format!("/{}{}", self.account_name, url.path());

        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in url.query_pairs() {
            params
                .entry(name.to_lowercase())
                .or_default()
                .push(value.into_owned());
        }

        for (name, mut values) in params {
            values.sort();
            resource.push_str(&format!("\n{}:{}", name, values.join(",")));
        }

        resource
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, DomainError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| DomainError::configuration(format!("Invalid account key: {}", e)))?;
        mac.update(string_to_sign.as_bytes());

        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl RequestAuthorizer for SharedKeyCredential {
    async fn authorize(&self, request: &mut reqwest::Request) -> Result<(), DomainError> {
        let signature = self.sign(&self.string_to_sign(request))?;
        let value = HeaderValue::from_str(&format!(
            "SharedKey {}:{}",
            self.account_name, signature
        ))
        .map_err(|e| DomainError::internal(format!("Invalid authorization header: {}", e)))?;

        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_on: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_on: serde_json::Value,
}

/// Bearer token from the hosting environment
#[derive(Debug)]
pub struct AmbientCredential {
    http: reqwest::Client,
    identity_endpoint: String,
    static_token: Option<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl AmbientCredential {
    /// Uses `AZURE_STORAGE_TOKEN` when set, otherwise the identity endpoint
    pub fn from_env(identity_endpoint: Option<String>) -> Self {
        Self::new(
            identity_endpoint,
            std::env::var("AZURE_STORAGE_TOKEN").ok().filter(|t| !t.is_empty()),
        )
    }

    pub fn new(identity_endpoint: Option<String>, static_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            identity_endpoint: identity_endpoint
                .unwrap_or_else(|| DEFAULT_IDENTITY_ENDPOINT.to_string()),
            static_token,
            cached: Mutex::new(None),
        }
    }

    async fn token(&self) -> Result<String, DomainError> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_on - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        debug!(expires_on = fresh.expires_on, "Acquired storage access token");
        let value = fresh.value.clone();
        *cached = Some(fresh);

        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, DomainError> {
        let response = self
            .http
            .get(&self.identity_endpoint)
            .query(&[("api-version", "2018-02-01"), ("resource", STORAGE_RESOURCE)])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| DomainError::transient_io(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::transient_io(format!(
                "Token endpoint returned HTTP {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DomainError::transient_io(format!("Invalid token response: {}", e)))?;

        let expires_on = match &token.expires_on {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or_else(|| chrono::Utc::now().timestamp() + TOKEN_REFRESH_MARGIN_SECS * 2);

        Ok(CachedToken {
            value: token.access_token,
            expires_on,
        })
    }
}

#[async_trait]
impl RequestAuthorizer for AmbientCredential {
    async fn authorize(&self, request: &mut reqwest::Request) -> Result<(), DomainError> {
        let token = self.token().await?;
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| DomainError::internal(format!("Invalid authorization header: {}", e)))?;

        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }
}
