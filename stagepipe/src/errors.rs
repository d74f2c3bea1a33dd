//! Error types for stagepipe.
//!
//! Errors fall into three families with different consequences:
//!
//! - [`DefinitionError`]: the pipeline definition is wrong. Always fatal at
//!   compile time and never retried.
//! - [`ResolutionError`]: no endpoint/token could be found. Publishing is
//!   skipped, compilation still succeeds.
//! - [`PublishError`]: the remote registry could not be reached or refused a
//!   request. Fatal for that publish attempt only.

use crate::core::ArtifactKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// The main error type for stagepipe operations.
#[derive(Debug, Error)]
pub enum StagepipeError {
    /// The pipeline definition is invalid.
    #[error("{0}")]
    Definition(#[from] DefinitionError),

    /// Endpoint or credentials could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Publishing to the registry failed.
    #[error("{0}")]
    Publish(#[from] PublishError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StagepipeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StagepipeError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "DEFINITION-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle, first stage repeated at the end.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }

    /// Returns the distinct stages participating in the cycle.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        let mut stages = self.cycle_path.clone();
        if stages.len() > 1 && stages.first() == stages.last() {
            stages.pop();
        }
        stages
    }
}

/// Errors in the pipeline definition, detected at compile time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DefinitionError {
    /// The pipeline has no stages.
    #[error("Pipeline has no stages")]
    EmptyPipeline,

    /// A name is empty or contains unsupported characters.
    #[error("Invalid {what} name '{name}'")]
    InvalidName {
        /// What was being named ("stage", "slot", "artifact", "pipeline").
        what: &'static str,
        /// The offending name.
        name: String,
    },

    /// Two stages share a name.
    #[error("Stage '{stage}' is declared more than once")]
    DuplicateStage {
        /// The duplicated stage name.
        stage: String,
    },

    /// A stage declares the same slot name twice.
    #[error("Stage '{stage}' declares slot '{slot}' more than once")]
    DuplicateSlot {
        /// The stage.
        stage: String,
        /// The duplicated slot.
        slot: String,
    },

    /// An artifact name is produced by more than one stage.
    #[error("Artifact '{artifact}' is produced by both '{existing_producer}' and '{producer}'")]
    DuplicateArtifact {
        /// The artifact name.
        artifact: String,
        /// The stage that declared it first.
        existing_producer: String,
        /// The stage that tried to declare it again.
        producer: String,
    },

    /// A consumer expects a different kind than the artifact's declared kind.
    #[error(
        "Stage '{stage}' slot '{slot}' expects {expected} but artifact '{artifact}' is {actual}"
    )]
    KindMismatch {
        /// The consuming stage.
        stage: String,
        /// The consuming slot.
        slot: String,
        /// The artifact name.
        artifact: String,
        /// The kind the slot expects.
        expected: ArtifactKind,
        /// The kind the artifact was declared with.
        actual: ArtifactKind,
    },

    /// An input slot names an artifact that no stage produces.
    #[error("Stage '{stage}' slot '{slot}' depends on artifact '{artifact}' which no stage produces")]
    UnresolvedDependency {
        /// The consuming stage.
        stage: String,
        /// The consuming slot.
        slot: String,
        /// The missing artifact name.
        artifact: String,
    },

    /// The stage dependencies form a cycle.
    #[error("{0}")]
    CyclicGraph(#[from] CycleDetectedError),
}

impl DefinitionError {
    /// Returns the stages named by this error.
    #[must_use]
    pub fn stages(&self) -> Vec<String> {
        match self {
            Self::EmptyPipeline | Self::InvalidName { .. } => Vec::new(),
            Self::DuplicateStage { stage }
            | Self::DuplicateSlot { stage, .. }
            | Self::KindMismatch { stage, .. }
            | Self::UnresolvedDependency { stage, .. } => vec![stage.clone()],
            Self::DuplicateArtifact {
                existing_producer,
                producer,
                ..
            } => vec![existing_producer.clone(), producer.clone()],
            Self::CyclicGraph(cycle) => cycle.stages(),
        }
    }

    /// Returns structured diagnostics for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        match self {
            Self::EmptyPipeline => {
                ContractErrorInfo::new("DEFINITION-EMPTY", "Cannot compile an empty pipeline")
                    .with_fix_hint("Add at least one stage to the pipeline before compiling.")
            }
            Self::InvalidName { what, name } => {
                ContractErrorInfo::new("DEFINITION-INVALID_NAME", self.to_string())
                    .with_fix_hint("Names must start with a letter or '_' and contain only letters, digits, '_' or '-'.")
                    .with_context_entry("kind", *what)
                    .with_context_entry("name", name.clone())
            }
            Self::DuplicateStage { stage } => {
                ContractErrorInfo::new("DEFINITION-DUPLICATE_STAGE", self.to_string())
                    .with_fix_hint("Rename one of the stages.")
                    .with_context_entry("stage", stage.clone())
            }
            Self::DuplicateSlot { stage, slot } => {
                ContractErrorInfo::new("DEFINITION-DUPLICATE_SLOT", self.to_string())
                    .with_context_entry("stage", stage.clone())
                    .with_context_entry("slot", slot.clone())
            }
            Self::DuplicateArtifact {
                artifact,
                existing_producer,
                producer,
            } => ContractErrorInfo::new("DEFINITION-DUPLICATE_ARTIFACT", self.to_string())
                .with_fix_hint("Every artifact must have exactly one producing stage.")
                .with_context_entry("artifact", artifact.clone())
                .with_context_entry("existing_producer", existing_producer.clone())
                .with_context_entry("producer", producer.clone()),
            Self::KindMismatch {
                stage,
                slot,
                artifact,
                ..
            } => ContractErrorInfo::new("DEFINITION-KIND_MISMATCH", self.to_string())
                .with_context_entry("stage", stage.clone())
                .with_context_entry("slot", slot.clone())
                .with_context_entry("artifact", artifact.clone()),
            Self::UnresolvedDependency {
                stage,
                slot,
                artifact,
            } => ContractErrorInfo::new("DEFINITION-UNRESOLVED", self.to_string())
                .with_fix_hint("Check for typos or add a stage that produces the artifact.")
                .with_context_entry("stage", stage.clone())
                .with_context_entry("slot", slot.clone())
                .with_context_entry("artifact", artifact.clone()),
            Self::CyclicGraph(cycle) => ContractErrorInfo::new(
                "DEFINITION-CYCLE",
                format!(
                    "Pipeline contains a dependency cycle: {}",
                    cycle.cycle_path.join(" -> ")
                ),
            )
            .with_fix_hint("Remove one of the artifact dependencies in the cycle to break it."),
        }
    }
}

/// Error raised when the endpoint/credential chain could not produce a
/// usable (endpoint, token) pair.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not resolve {} (tried: {})", missing.join(" and "), attempts.join(", "))]
pub struct ResolutionError {
    /// Which values are still missing ("endpoint", "token").
    pub missing: Vec<String>,
    /// Providers consulted, in order.
    pub attempts: Vec<String>,
}

impl ResolutionError {
    /// Creates a new resolution error.
    #[must_use]
    pub fn new(missing: Vec<String>, attempts: Vec<String>) -> Self {
        Self { missing, attempts }
    }
}

/// Errors from an individual credential provider. Never escapes the resolver.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Reading a local file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// The file that could not be read.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file or response had an unexpected shape.
    #[error("Malformed {what}: {reason}")]
    Malformed {
        /// What was being parsed.
        what: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A cluster API call failed.
    #[error("Cluster request failed: {0}")]
    Request(String),
}

/// Errors raised while talking to the pipeline registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The endpoint could not be turned into a URL.
    #[error("Invalid registry endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The request never produced a response.
    #[error("Registry transport error during {operation}: {message}")]
    Transport {
        /// The operation being attempted ("list", "create", "append_version").
        operation: &'static str,
        /// The transport failure.
        message: String,
    },

    /// The registry answered with a non-success status.
    #[error("Registry rejected {operation} with status {status}: {body}")]
    Remote {
        /// The operation being attempted.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The registry answered with a body we could not decode.
    #[error("Could not decode registry response for {operation}: {message}")]
    Decode {
        /// The operation being attempted.
        operation: &'static str,
        /// The decode failure.
        message: String,
    },
}

impl PublishError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            message: message.into(),
        }
    }
}

/// Error raised when configuration cannot be loaded.
#[derive(Debug, Error)]
#[error("Invalid configuration: {0}")]
pub struct ConfigError(#[from] pub Box<figment::Error>);

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}
