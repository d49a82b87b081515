//! Queue message schemes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// JSON envelope referencing an uploaded image by blob name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEnvelope {
    pub image_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<i64>,
}

impl SampleEnvelope {
    pub fn new(image_name: impl Into<String>, label: Option<i64>) -> Self {
        Self {
            image_name: image_name.into(),
            label,
        }
    }
}

/// Which wire form a deployment puts on the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageScheme {
    /// `{"image_name": ..., "label": ...}` pointing at a blob
    #[default]
    Envelope,
    /// The codec string itself, label byte included
    Inline,
}

impl fmt::Display for MessageScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageScheme::Envelope => write!(f, "envelope"),
            MessageScheme::Inline => write!(f, "inline"),
        }
    }
}

impl FromStr for MessageScheme {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "envelope" | "json" => Ok(MessageScheme::Envelope),
            "inline" | "legacy" => Ok(MessageScheme::Inline),
            _ => Err(DomainError::configuration(format!(
                "Unknown message scheme: {}. Valid schemes: envelope, inline",
                s
            ))),
        }
    }
}

/// Parsed queue message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMessage {
    Envelope(SampleEnvelope),
    Inline(String),
}

impl TransportMessage {
    /// Parses raw message text according to the deployment's scheme
    pub fn parse(text: &str, scheme: MessageScheme) -> Result<Self, DomainError> {
        match scheme {
            MessageScheme::Envelope => serde_json::from_str(text)
                .map(TransportMessage::Envelope)
                .map_err(|e| DomainError::decode(format!("Invalid message envelope: {}", e))),
            MessageScheme::Inline => Ok(TransportMessage::Inline(text.trim().to_string())),
        }
    }

    pub fn to_text(&self) -> Result<String, DomainError> {
        match self {
            TransportMessage::Envelope(envelope) => serde_json::to_string(envelope)
                .map_err(|e| DomainError::internal(format!("Failed to encode envelope: {}", e))),
            TransportMessage::Inline(encoded) => Ok(encoded.clone()),
        }
    }

    pub fn scheme(&self) -> MessageScheme {
        match self {
            TransportMessage::Envelope(_) => MessageScheme::Envelope,
            TransportMessage::Inline(_) => MessageScheme::Inline,
        }
    }
}
