//! The portable compiled graph document.
//!
//! The document is plain data that an execution engine can schedule. It is
//! serialized as pretty JSON with every collection in a fixed order, so the
//! same stage set always produces the same bytes. Secret-sourced environment
//! variables appear only as references.

use super::dag::{Edge, PipelineGraph};
use crate::core::ArtifactKind;
use crate::errors::StagepipeError;
use crate::stages::EnvBinding;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Schema identifier written into every document.
pub const SCHEMA_VERSION: &str = "stagepipe.dev/graph/v1";

/// Root of the compiled graph document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Document schema identifier.
    pub schema_version: String,
    /// Pipeline name.
    pub pipeline: String,
    /// Stages with no inputs.
    pub entry_points: Vec<String>,
    /// A valid topological execution order.
    pub execution_order: Vec<String>,
    /// Stage definitions, in declaration order.
    pub stages: Vec<StageEntry>,
    /// Artifacts, in declaration order.
    pub artifacts: Vec<ArtifactEntry>,
    /// Producer → consumer edges.
    pub edges: Vec<Edge>,
}

/// One stage as the execution engine sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageEntry {
    /// Stage name.
    pub name: String,
    /// Container image.
    pub image: String,
    /// Extra packages to install.
    pub packages: Vec<String>,
    /// Upstream stages that must succeed first.
    pub depends_on: Vec<String>,
    /// Input slots with the paths the stage will read.
    pub inputs: Vec<SlotEntry>,
    /// Output slots with the paths the stage must write.
    pub outputs: Vec<SlotEntry>,
    /// Environment bindings; secrets are references only.
    pub env: Vec<EnvBinding>,
}

/// A resolved slot: which artifact it carries and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEntry {
    /// Slot name, i.e. the stage body's parameter.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Artifact name.
    pub artifact: String,
    /// Path relative to the run's artifact root.
    pub path: String,
}

/// An artifact with its producer and consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Artifact name.
    pub name: String,
    /// Artifact kind.
    pub kind: ArtifactKind,
    /// Producing stage.
    pub producer: String,
    /// Consuming stages.
    pub consumers: Vec<String>,
    /// Path relative to the run's artifact root.
    pub path: String,
}

/// Path, relative to the run's artifact root, where a produced artifact lives.
#[must_use]
pub fn artifact_path(producer: &str, slot: &str) -> String {
    format!("artifacts/{producer}/{slot}")
}

impl GraphDocument {
    /// Builds the document for a validated graph.
    #[must_use]
    pub fn from_graph(graph: &PipelineGraph) -> Self {
        let path_of = |artifact: &str| {
            graph
                .artifacts()
                .iter()
                .find(|a| a.name == artifact)
                .map(|a| artifact_path(&a.producer, &a.producer_slot))
                .unwrap_or_default()
        };

        let stages = graph
            .stages()
            .iter()
            .map(|stage| StageEntry {
                name: stage.name.clone(),
                image: stage.runtime.image.clone(),
                packages: stage.runtime.packages.clone(),
                depends_on: graph
                    .dependencies_of(&stage.name)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                inputs: stage
                    .inputs
                    .iter()
                    .map(|slot| SlotEntry {
                        name: slot.name.clone(),
                        kind: slot.kind.clone(),
                        artifact: slot.artifact_name().to_string(),
                        path: path_of(slot.artifact_name()),
                    })
                    .collect(),
                outputs: stage
                    .outputs
                    .iter()
                    .map(|slot| SlotEntry {
                        name: slot.name.clone(),
                        kind: slot.kind.clone(),
                        artifact: slot.artifact_name().to_string(),
                        path: artifact_path(&stage.name, &slot.name),
                    })
                    .collect(),
                env: stage.env.clone(),
            })
            .collect();

        let artifacts = graph
            .artifacts()
            .iter()
            .map(|a| ArtifactEntry {
                name: a.name.clone(),
                kind: a.kind.clone(),
                producer: a.producer.clone(),
                consumers: a.consumers.clone(),
                path: artifact_path(&a.producer, &a.producer_slot),
            })
            .collect();

        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            pipeline: graph.name().to_string(),
            entry_points: graph
                .entry_points()
                .into_iter()
                .map(str::to_string)
                .collect(),
            execution_order: graph.execution_order().to_vec(),
            stages,
            artifacts,
            edges: graph.edges().to_vec(),
        }
    }
}

/// A compiled graph: the document plus its serialized bytes.
///
/// This is what gets written to disk and uploaded to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledGraph {
    document: GraphDocument,
    bytes: Vec<u8>,
}

impl CompiledGraph {
    /// Serializes a document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn from_document(document: GraphDocument) -> Result<Self, StagepipeError> {
        let mut bytes = serde_json::to_vec_pretty(&document)?;
        bytes.push(b'\n');
        Ok(Self { document, bytes })
    }

    /// Parses a previously compiled document.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a graph document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StagepipeError> {
        let document: GraphDocument = serde_json::from_slice(bytes)?;
        Ok(Self {
            document,
            bytes: bytes.to_vec(),
        })
    }

    /// Returns the structured document.
    #[must_use]
    pub fn document(&self) -> &GraphDocument {
        &self.document
    }

    /// Returns the serialized document.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the pipeline name recorded in the document.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.document.pipeline
    }

    /// Returns the hex SHA-256 digest of the serialized document.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Writes the serialized document to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<(), StagepipeError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}
