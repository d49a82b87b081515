//! Model versions and artifact naming

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Folder holding every model artifact
pub const MODELS_DIR: &str = "models/";

/// Unix-seconds identifier of a published model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelVersion(u64);

impl ModelVersion {
    pub fn new(unix_seconds: u64) -> Result<Self, DomainError> {
        if unix_seconds == 0 {
            return Err(DomainError::invalid_input("Model version must be positive"));
        }

        Ok(Self(unix_seconds))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// ISO-8601 rendering of the version timestamp (UTC, no offset)
    pub fn to_iso(&self) -> String {
        i64::try_from(self.0)
            .ok()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic artifact keys: `models/<prefix>_<version>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    prefix: String,
    extension: String,
}

impl ArtifactNaming {
    pub fn new(prefix: impl Into<String>, extension: impl Into<String>) -> Result<Self, DomainError> {
        let prefix = prefix.into();
        let extension = extension.into().trim_start_matches('.').to_string();

        if prefix.is_empty() || prefix.contains('/') {
            return Err(DomainError::configuration(format!(
                "Invalid model prefix '{}'",
                prefix
            )));
        }

        if extension.is_empty() || extension.contains('/') {
            return Err(DomainError::configuration(format!(
                "Invalid model extension '{}'",
                extension
            )));
        }

        Ok(Self { prefix, extension })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn key(&self, version: ModelVersion) -> String {
        format!("{}{}_{}.{}", MODELS_DIR, self.prefix, version, self.extension)
    }

    /// Extracts the version from a key produced by `key`; other keys yield None
    pub fn parse(&self, key: &str) -> Option<ModelVersion> {
        let name = key.strip_prefix(MODELS_DIR)?;
        let stem = name
            .strip_suffix(self.extension.as_str())?
            .strip_suffix('.')?;
        let (prefix, digits) = stem.rsplit_once('_')?;

        if prefix != self.prefix || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        digits.parse().ok().and_then(|v| ModelVersion::new(v).ok())
    }
}
