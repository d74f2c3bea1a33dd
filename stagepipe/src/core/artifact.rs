//! Typed artifact handles passed between stages.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The declared kind of an artifact.
///
/// The well-known kinds cover what ML pipelines usually pass around; anything
/// else is carried as [`ArtifactKind::Custom`]. Kinds compare by their
/// lowercase name, so `Custom("Scaler")` and `Custom("scaler")` are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ArtifactKind {
    /// Tabular or file data (e.g. a downloaded CSV).
    Dataset,
    /// A trained model (e.g. an ONNX file).
    Model,
    /// Evaluation metrics.
    Metrics,
    /// Any other kind, identified by its lowercase name.
    Custom(String),
}

impl ArtifactKind {
    /// Creates a kind from a name, folding case and mapping well-known names
    /// to their variants.
    #[must_use]
    pub fn custom(name: impl AsRef<str>) -> Self {
        match name.as_ref().to_ascii_lowercase().as_str() {
            "dataset" => Self::Dataset,
            "model" => Self::Model,
            "metrics" => Self::Metrics,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Returns the name. Lowercase unless a `Custom` was built directly.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Dataset => "dataset",
            Self::Model => "model",
            Self::Metrics => "metrics",
            Self::Custom(name) => name,
        }
    }
}

impl PartialEq for ArtifactKind {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for ArtifactKind {}

impl Hash for ArtifactKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().to_ascii_lowercase().hash(state);
    }
}

impl PartialOrd for ArtifactKind {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArtifactKind {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str()
            .to_ascii_lowercase()
            .cmp(&other.as_str().to_ascii_lowercase())
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ArtifactKind {
    fn from(value: String) -> Self {
        Self::custom(value)
    }
}

impl From<&str> for ArtifactKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ArtifactKind> for String {
    fn from(kind: ArtifactKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A named, typed data handle with exactly one producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique name within one compilation.
    pub name: String,
    /// Declared kind.
    pub kind: ArtifactKind,
    /// The stage that produces this artifact.
    pub producer: String,
    /// The output slot of the producer that writes it.
    pub producer_slot: String,
    /// Consuming stages, in binding order.
    #[serde(default)]
    pub consumers: Vec<String>,
}

impl Artifact {
    /// Creates an artifact with no consumers yet.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ArtifactKind,
        producer: impl Into<String>,
        producer_slot: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            producer: producer.into(),
            producer_slot: producer_slot.into(),
            consumers: Vec::new(),
        }
    }

    /// Returns true if no stage consumes this artifact.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.consumers.is_empty()
    }
}
