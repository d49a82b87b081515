use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage I/O error: {message}")]
    TransientIo { message: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Size mismatch: expected {expected} pixels, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid label: {value}")]
    InvalidLabel { value: i64 },

    #[error("Missing resource: {key}")]
    MissingResource { key: String },

    #[error("No model versions found under '{prefix}'")]
    NoVersions { prefix: String },

    #[error("Model version {version} already exists")]
    DuplicateVersion { version: u64 },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Model error: {message}")]
    Model { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transient_io(message: impl Into<String>) -> Self {
        Self::TransientIo {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn size_mismatch(expected: usize, actual: usize) -> Self {
        Self::SizeMismatch { expected, actual }
    }

    pub fn invalid_label(value: i64) -> Self {
        Self::InvalidLabel { value }
    }

    pub fn missing_resource(key: impl Into<String>) -> Self {
        Self::MissingResource { key: key.into() }
    }

    pub fn no_versions(prefix: impl Into<String>) -> Self {
        Self::NoVersions {
            prefix: prefix.into(),
        }
    }

    pub fn duplicate_version(version: u64) -> Self {
        Self::DuplicateVersion { version }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn model_unavailable(message: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Errors caused by a single malformed sample; the drain skips them.
    pub fn is_malformed_sample(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. }
                | Self::SizeMismatch { .. }
                | Self::InvalidLabel { .. }
                | Self::InvalidInput { .. }
        )
    }

    /// Errors that must stop the training loop instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::DuplicateVersion { .. }
        )
    }

    /// Short machine-readable name, used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::TransientIo { .. } => "transient_io",
            Self::Decode { .. } => "decode",
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::InvalidLabel { .. } => "invalid_label",
            Self::MissingResource { .. } => "missing_resource",
            Self::NoVersions { .. } => "no_versions",
            Self::DuplicateVersion { .. } => "duplicate_version",
            Self::Conflict { .. } => "conflict",
            Self::InvalidInput { .. } => "invalid_input",
            Self::ModelUnavailable { .. } => "model_unavailable",
            Self::Model { .. } => "model",
            Self::Internal { .. } => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_error() {
        let error = DomainError::missing_resource("abc_drawing.png");
        assert_eq!(error.to_string(), "Missing resource: abc_drawing.png");
    }

    #[test]
    fn test_size_mismatch_error() {
        let error = DomainError::size_mismatch(800, 799);
        assert_eq!(
            error.to_string(),
            "Size mismatch: expected 800 pixels, got 799"
        );
    }

    #[test]
    fn test_malformed_sample_classification() {
        assert!(DomainError::decode("bad base64").is_malformed_sample());
        assert!(DomainError::invalid_label(7).is_malformed_sample());
        assert!(!DomainError::missing_resource("x").is_malformed_sample());
        assert!(!DomainError::transient_io("timeout").is_malformed_sample());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(DomainError::duplicate_version(100).is_fatal());
        assert!(DomainError::configuration("missing queue").is_fatal());
        assert!(!DomainError::transient_io("reset").is_fatal());
        assert!(!DomainError::no_versions("models/").is_fatal());
    }
}
