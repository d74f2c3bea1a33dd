//! Stage descriptors.
//!
//! A stage is a containerized unit of work. Its body is opaque here; what
//! matters for compilation is the runtime it needs, the typed artifact slots
//! it reads and writes, and the environment it expects.

mod env;

pub use env::{EnvBinding, SecretRef};

use crate::core::ArtifactKind;
use crate::errors::DefinitionError;
use crate::utils::validate_name;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Container runtime requirements for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSpec {
    /// Container image reference.
    pub image: String,
    /// Extra packages installed before the stage body runs.
    #[serde(default)]
    pub packages: Vec<String>,
}

impl RuntimeSpec {
    /// Creates a runtime spec for an image with no extra packages.
    #[must_use]
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            packages: Vec::new(),
        }
    }
}

/// An input slot: a named parameter of the stage body that receives the
/// path of an upstream artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSlot {
    /// Slot name, unique within the stage.
    pub name: String,
    /// Kind the stage expects.
    pub kind: ArtifactKind,
    /// Artifact to read. Defaults to the slot name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl InputSlot {
    /// Name of the artifact this slot reads.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.name)
    }
}

/// An output slot: a named path the stage body writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSlot {
    /// Slot name, unique within the stage.
    pub name: String,
    /// Kind of the produced artifact.
    pub kind: ArtifactKind,
    /// Name of the produced artifact. Defaults to the slot name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

impl OutputSlot {
    /// Name of the artifact this slot produces.
    #[must_use]
    pub fn artifact_name(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.name)
    }
}

/// A fully declared stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDescriptor {
    /// Unique name within the pipeline.
    pub name: String,
    /// Runtime requirements.
    pub runtime: RuntimeSpec,
    /// Input slots, in declaration order.
    #[serde(default)]
    pub inputs: Vec<InputSlot>,
    /// Output slots, in declaration order.
    #[serde(default)]
    pub outputs: Vec<OutputSlot>,
    /// Environment bindings, in declaration order.
    #[serde(default)]
    pub env: Vec<EnvBinding>,
}

impl StageDescriptor {
    /// Creates a stage running in `image` with no slots.
    #[must_use]
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runtime: RuntimeSpec::new(image),
            inputs: Vec::new(),
            outputs: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Adds an extra package to install.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.runtime.packages.push(package.into());
        self
    }

    /// Adds several extra packages.
    #[must_use]
    pub fn with_packages(mut self, packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.runtime
            .packages
            .extend(packages.into_iter().map(Into::into));
        self
    }

    /// Adds an input slot reading the artifact of the same name.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>, kind: ArtifactKind) -> Self {
        self.inputs.push(InputSlot {
            name: name.into(),
            kind,
            artifact: None,
        });
        self
    }

    /// Adds an input slot reading a differently named artifact.
    #[must_use]
    pub fn with_input_from(
        mut self,
        name: impl Into<String>,
        kind: ArtifactKind,
        artifact: impl Into<String>,
    ) -> Self {
        self.inputs.push(InputSlot {
            name: name.into(),
            kind,
            artifact: Some(artifact.into()),
        });
        self
    }

    /// Adds an output slot producing the artifact of the same name.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>, kind: ArtifactKind) -> Self {
        self.outputs.push(OutputSlot {
            name: name.into(),
            kind,
            artifact: None,
        });
        self
    }

    /// Adds an output slot producing a differently named artifact.
    #[must_use]
    pub fn with_output_as(
        mut self,
        name: impl Into<String>,
        kind: ArtifactKind,
        artifact: impl Into<String>,
    ) -> Self {
        self.outputs.push(OutputSlot {
            name: name.into(),
            kind,
            artifact: Some(artifact.into()),
        });
        self
    }

    /// Adds a literal environment variable.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push(EnvBinding::literal(name, value));
        self
    }

    /// Maps keys of a secret to environment variables, as `(env_name, key)`
    /// pairs.
    #[must_use]
    pub fn with_secret_env<'a>(
        mut self,
        secret_name: &str,
        mapping: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        for (env_name, key) in mapping {
            self.env
                .push(EnvBinding::secret(env_name, SecretRef::new(secret_name, key)));
        }
        self
    }

    /// Returns true if the stage has no inputs.
    #[must_use]
    pub fn is_entry_point(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Validates names and slot uniqueness.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is malformed or a slot name repeats.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        validate_name("stage", &self.name)?;

        let mut seen = HashSet::new();
        let slots = self
            .inputs
            .iter()
            .map(|s| (s.name.as_str(), s.artifact_name()))
            .chain(self.outputs.iter().map(|s| (s.name.as_str(), s.artifact_name())));

        for (slot, artifact) in slots {
            validate_name("slot", slot)?;
            validate_name("artifact", artifact)?;
            if !seen.insert(slot) {
                return Err(DefinitionError::DuplicateSlot {
                    stage: self.name.clone(),
                    slot: slot.to_string(),
                });
            }
        }

        Ok(())
    }
}
