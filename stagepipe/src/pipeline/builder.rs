//! Pipeline builder: collects stage descriptors and compiles them.

use super::dag::{detect_cycles, Edge, PipelineGraph};
use super::document::{CompiledGraph, GraphDocument};
use super::registry::ArtifactRegistry;
use crate::errors::{DefinitionError, StagepipeError};
use crate::stages::StageDescriptor;
use crate::utils::validate_display_name;
use std::collections::HashMap;
use tracing::debug;

/// Builder for one pipeline compilation.
///
/// Stages are owned by the builder once added and cannot be changed
/// afterwards. All artifact bookkeeping happens inside [`Self::build`], so a
/// builder never carries state from one compilation into another.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<StageDescriptor>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is malformed or its name is taken.
    pub fn stage(mut self, stage: StageDescriptor) -> Result<Self, DefinitionError> {
        self.add_stage(stage)?;
        Ok(self)
    }

    /// Adds a stage in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is malformed or its name is taken.
    pub fn add_stage(&mut self, stage: StageDescriptor) -> Result<(), DefinitionError> {
        stage.validate()?;

        if self.stages.iter().any(|s| s.name == stage.name) {
            return Err(DefinitionError::DuplicateStage { stage: stage.name });
        }

        self.stages.push(stage);
        Ok(())
    }

    /// Adds every stage of `stages`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first stage that cannot be added.
    pub fn stages(
        mut self,
        stages: impl IntoIterator<Item = StageDescriptor>,
    ) -> Result<Self, DefinitionError> {
        for stage in stages {
            self.add_stage(stage)?;
        }
        Ok(self)
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Resolves every input, checks the graph for cycles and returns the
    /// validated graph.
    ///
    /// # Errors
    ///
    /// Returns the first [`DefinitionError`] found.
    pub fn build(self) -> Result<PipelineGraph, DefinitionError> {
        validate_display_name(&self.name)?;
        if self.stages.is_empty() {
            return Err(DefinitionError::EmptyPipeline);
        }

        let mut registry = ArtifactRegistry::new();
        for stage in &self.stages {
            for slot in &stage.outputs {
                registry.declare(
                    slot.artifact_name(),
                    slot.kind.clone(),
                    &stage.name,
                    &slot.name,
                )?;
            }
        }

        let mut edges = Vec::new();
        let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
        for stage in &self.stages {
            let deps = dependencies.entry(stage.name.clone()).or_default();
            for slot in &stage.inputs {
                let artifact = registry.bind(&stage.name, slot)?;
                if !deps.contains(&artifact.producer) {
                    deps.push(artifact.producer.clone());
                }
                edges.push(Edge {
                    from: artifact.producer.clone(),
                    to: stage.name.clone(),
                    artifact: artifact.name.clone(),
                    slot: slot.name.clone(),
                });
            }
        }

        let stage_order: Vec<String> = self.stages.iter().map(|s| s.name.clone()).collect();
        // A non-empty graph without an entry point always has a cycle.
        detect_cycles(&stage_order, &dependencies)?;

        debug!(
            pipeline = %self.name,
            stages = self.stages.len(),
            artifacts = registry.len(),
            edges = edges.len(),
            "Pipeline graph validated"
        );

        Ok(PipelineGraph::new(
            self.name,
            self.stages,
            registry.into_artifacts(),
            edges,
        ))
    }

    /// Builds the graph and serializes it into a compiled document.
    ///
    /// # Errors
    ///
    /// Returns [`StagepipeError::Definition`] for any definition problem.
    pub fn compile(self) -> Result<CompiledGraph, StagepipeError> {
        let graph = self.build()?;
        CompiledGraph::from_document(GraphDocument::from_graph(&graph))
    }
}

/// Compiles an ordered sequence of stages into a graph document.
///
/// # Errors
///
/// Returns [`StagepipeError::Definition`] for any definition problem.
pub fn compile(
    name: impl Into<String>,
    stages: impl IntoIterator<Item = StageDescriptor>,
) -> Result<CompiledGraph, StagepipeError> {
    PipelineBuilder::new(name).stages(stages)?.compile()
}
