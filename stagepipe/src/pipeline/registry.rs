//! Artifact bookkeeping for a single compilation.

use crate::core::{Artifact, ArtifactKind};
use crate::errors::DefinitionError;
use crate::stages::InputSlot;
use std::collections::HashMap;

/// Tracks every artifact declared during one compilation, its producer and
/// its consumers.
///
/// A registry lives exactly as long as one [`super::PipelineBuilder::build`]
/// call; nothing is shared between compilations.
#[derive(Debug, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
    index: HashMap<String, usize>,
}

impl ArtifactRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an artifact produced by `producer` through `producer_slot`.
    ///
    /// Declaring the same artifact again from the same producer slot returns
    /// the existing artifact.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::DuplicateArtifact`] if the name is already
    /// produced elsewhere.
    pub fn declare(
        &mut self,
        name: &str,
        kind: ArtifactKind,
        producer: &str,
        producer_slot: &str,
    ) -> Result<&Artifact, DefinitionError> {
        if let Some(&idx) = self.index.get(name) {
            let existing = &self.artifacts[idx];
            if existing.producer == producer && existing.producer_slot == producer_slot {
                return Ok(existing);
            }
            return Err(DefinitionError::DuplicateArtifact {
                artifact: name.to_string(),
                existing_producer: existing.producer.clone(),
                producer: producer.to_string(),
            });
        }

        let idx = self.artifacts.len();
        self.artifacts
            .push(Artifact::new(name, kind, producer, producer_slot));
        self.index.insert(name.to_string(), idx);
        Ok(&self.artifacts[idx])
    }

    /// Binds an input slot of `stage` to the artifact it names, recording
    /// `stage` as a consumer.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::UnresolvedDependency`] if no stage produces
    /// the artifact, or [`DefinitionError::KindMismatch`] if the slot expects
    /// a different kind.
    pub fn bind(&mut self, stage: &str, slot: &InputSlot) -> Result<&Artifact, DefinitionError> {
        let artifact_name = slot.artifact_name();
        let Some(&idx) = self.index.get(artifact_name) else {
            return Err(DefinitionError::UnresolvedDependency {
                stage: stage.to_string(),
                slot: slot.name.clone(),
                artifact: artifact_name.to_string(),
            });
        };

        let artifact = &mut self.artifacts[idx];
        if artifact.kind != slot.kind {
            return Err(DefinitionError::KindMismatch {
                stage: stage.to_string(),
                slot: slot.name.clone(),
                artifact: artifact.name.clone(),
                expected: slot.kind.clone(),
                actual: artifact.kind.clone(),
            });
        }

        if !artifact.consumers.iter().any(|c| c == stage) {
            artifact.consumers.push(stage.to_string());
        }
        Ok(artifact)
    }

    /// Looks up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.index.get(name).map(|&idx| &self.artifacts[idx])
    }

    /// Returns all artifacts in declaration order.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Consumes the registry, returning artifacts in declaration order.
    #[must_use]
    pub fn into_artifacts(self) -> Vec<Artifact> {
        self.artifacts
    }

    /// Returns the number of declared artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if nothing has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
