use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ArtifactNaming, DomainError, LabelSet, MessageScheme, SampleCodec};
use crate::infrastructure::cache::DEFAULT_CACHE_CAPACITY;
use crate::infrastructure::observability::MetricsConfig;
use crate::infrastructure::services::CoordinatorSettings;
use crate::infrastructure::storage::CredentialMode;

/// Environment variables of earlier deployments, mapped onto config keys
const LEGACY_ENV: [(&str, &str); 5] = [
    ("STORAGE_CONTAINER", "storage.container"),
    ("STORAGE_QUEUE", "storage.queue"),
    ("STORAGE_CONNECTION_STRING", "storage.connection_string"),
    ("STORAGE_BLOB_URL", "storage.blob_endpoint"),
    ("STORAGE_QUEUE_URL", "storage.queue_endpoint"),
];

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where blobs and queue messages live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credential: CredentialMode,
    pub container: String,
    pub queue: String,
    pub connection_string: Option<String>,
    /// Overrides the endpoint derived from the connection string
    pub blob_endpoint: Option<String>,
    pub queue_endpoint: Option<String>,
    /// Token endpoint for the ambient credential
    pub identity_endpoint: Option<String>,
    pub visibility_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

/// Sample format, model naming and retraining cadence
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model_prefix: String,
    pub model_extension: String,
    /// Class names, indexed by label value
    pub class_names: Vec<String>,
    pub message_scheme: MessageScheme,
    pub poll_interval_secs: u64,
    pub backlog_threshold: usize,
    pub batch_limit: usize,
    pub cache_capacity: usize,
    pub validation_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credential: CredentialMode::default(),
            container: "images".to_string(),
            queue: "samples".to_string(),
            connection_string: None,
            blob_endpoint: None,
            queue_endpoint: None,
            identity_endpoint: None,
            visibility_timeout_secs: 30,
            request_timeout_secs: 30,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_prefix: "model".to_string(),
            model_extension: "json".to_string(),
            class_names: LabelSet::hello_world().names().to_vec(),
            message_scheme: MessageScheme::default(),
            poll_interval_secs: 10,
            backlog_threshold: 1,
            batch_limit: 32,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            validation_key: Some("datasets/val_data.zip".to_string()),
        }
    }
}

impl PipelineConfig {
    pub fn label_set(&self) -> Result<LabelSet, DomainError> {
        LabelSet::new(self.class_names.iter().cloned())
    }

    pub fn codec(&self) -> Result<SampleCodec, DomainError> {
        Ok(SampleCodec::new(self.label_set()?))
    }

    pub fn naming(&self) -> Result<ArtifactNaming, DomainError> {
        ArtifactNaming::new(self.model_prefix.clone(), self.model_extension.clone())
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            backlog_threshold: self.backlog_threshold,
            batch_limit: self.batch_limit,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("pipeline.class_names")
                    .try_parsing(true),
            );

        for (var, key) in LEGACY_ENV {
            if let Some(value) = std::env::var(var).ok().filter(|v| !v.is_empty()) {
                builder = builder.set_override(key, value)?;
            }
        }

        if let Ok(flag) = std::env::var("USE_AZURE_CREDENTIAL") {
            let ambient = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
            let mode = if ambient {
                CredentialMode::Ambient
            } else {
                CredentialMode::ConnectionString
            };
            builder = builder.set_override("storage.credential", mode.to_string())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Checks settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<(), DomainError> {
        let storage = &self.storage;

        if storage.container.trim().is_empty() {
            return Err(DomainError::configuration("storage.container must not be empty"));
        }
        if storage.queue.trim().is_empty() {
            return Err(DomainError::configuration("storage.queue must not be empty"));
        }

        match storage.credential {
            CredentialMode::InMemory => {}
            CredentialMode::ConnectionString => {
                if storage.connection_string.as_deref().is_none_or(str::is_empty) {
                    return Err(DomainError::configuration(
                        "storage.connection_string is required for the connection_string credential",
                    ));
                }
            }
            CredentialMode::Ambient => {
                if storage.blob_endpoint.is_none() || storage.queue_endpoint.is_none() {
                    return Err(DomainError::configuration(
                        "storage.blob_endpoint and storage.queue_endpoint are required for the ambient credential",
                    ));
                }
            }
        }

        let pipeline = &self.pipeline;
        pipeline.label_set()?;
        pipeline.naming()?;

        if pipeline.batch_limit == 0 {
            return Err(DomainError::configuration("pipeline.batch_limit must be positive"));
        }
        if pipeline.cache_capacity == 0 {
            return Err(DomainError::configuration("pipeline.cache_capacity must be positive"));
        }
        if pipeline.poll_interval_secs == 0 {
            return Err(DomainError::configuration("pipeline.poll_interval_secs must be positive"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.credential, CredentialMode::InMemory);
        assert_eq!(config.pipeline.class_names, vec!["world", "hello"]);
        assert_eq!(config.pipeline.cache_capacity, 5);
        assert_eq!(config.pipeline.message_scheme, MessageScheme::Envelope);
    }

    #[test]
    fn test_partial_sections_deserialize() {
        let config: AppConfig = serde_json::from_str(
            r#"{
                "storage": {"credential": "connection_string", "connection_string": "UseDevelopmentStorage=true"},
                "pipeline": {"class_names": ["dandelion", "daisy", "tulips", "sunflowers", "roses"], "model_prefix": "flowersmodel", "model_extension": "keras"},
                "logging": {"format": "json"}
            }"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.container, "images");
        assert_eq!(config.pipeline.label_set().unwrap(), LabelSet::flowers());
        assert_eq!(config.pipeline.poll_interval_secs, 10);
    }

    #[test]
    fn test_connection_string_mode_requires_string() {
        let mut config = AppConfig::default();
        config.storage.credential = CredentialMode::ConnectionString;

        assert!(matches!(
            config.validate(),
            Err(DomainError::Configuration { .. })
        ));
    }

    #[test]
    fn test_ambient_mode_requires_endpoints() {
        let mut config = AppConfig::default();
        config.storage.credential = CredentialMode::Ambient;
        config.storage.blob_endpoint = Some("https://acct.blob.core.windows.net".to_string());

        assert!(config.validate().is_err());

        config.storage.queue_endpoint = Some("https://acct.queue.core.windows.net".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_pipeline_settings() {
        let mut config = AppConfig::default();
        config.pipeline.class_names = vec!["a".to_string(), "a".to_string()];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.cache_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_coordinator_settings() {
        let settings = PipelineConfig::default().coordinator_settings();
        assert_eq!(settings.poll_interval, Duration::from_secs(10));
        assert_eq!(settings.backlog_threshold, 1);
        assert_eq!(settings.batch_limit, 32);
    }
}
