//! Closed label enumerations

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A class index known to be a member of some `LabelSet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(u8);

impl Label {
    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered class names; the position of a name is its label value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    /// Creates a label set from ordered class names
    pub fn new<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();

        if names.is_empty() {
            return Err(DomainError::configuration("Label set cannot be empty"));
        }

        if names.len() > usize::from(u8::MAX) + 1 {
            return Err(DomainError::configuration(format!(
                "Label set has {} classes; a single label byte holds at most 256",
                names.len()
            )));
        }

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(DomainError::configuration(format!(
                    "Duplicate class name '{}' in label set",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// The two-class drawing set: world=0, hello=1
    pub fn hello_world() -> Self {
        Self {
            names: vec!["world".to_string(), "hello".to_string()],
        }
    }

    /// The five-class flower set
    pub fn flowers() -> Self {
        Self {
            names: ["dandelion", "daisy", "tulips", "sunflowers", "roses"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Validates a raw integer against the enumeration
    pub fn label(&self, value: i64) -> Result<Label, DomainError> {
        if value < 0 || value as usize >= self.names.len() {
            return Err(DomainError::invalid_label(value));
        }

        Ok(Label(value as u8))
    }

    /// Resolves a class name or a numeric label
    pub fn parse(&self, input: &str) -> Result<Label, DomainError> {
        if let Some(index) = self.names.iter().position(|n| n.eq_ignore_ascii_case(input)) {
            return Ok(Label(index as u8));
        }

        let value: i64 = input
            .trim()
            .parse()
            .map_err(|_| DomainError::invalid_input(format!("Unknown class '{}'", input)))?;

        self.label(value)
    }

    pub fn contains(&self, label: Label) -> bool {
        label.index() < self.names.len()
    }

    pub fn name(&self, label: Label) -> Option<&str> {
        self.names.get(label.index()).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// All labels in order
    pub fn labels(&self) -> impl Iterator<Item = Label> + '_ {
        (0..self.names.len()).map(|i| Label(i as u8))
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::hello_world()
    }
}
