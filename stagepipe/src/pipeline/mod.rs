//! Pipeline definition and compilation.
//!
//! This module provides:
//! - The per-compilation artifact registry
//! - The pipeline builder and graph validation
//! - The portable compiled graph document
//! - The built-in pipeline definition and definition files

mod builder;
mod dag;
mod definitions;
mod document;
mod integration_tests;
mod registry;

pub use builder::{compile, PipelineBuilder};
pub use dag::{Edge, PipelineGraph};
pub use definitions::{
    fraud_detection_pipeline, DefinitionFile, FRAUD_DETECTION_PIPELINE, MODEL_OBJECT_KEY,
    TENSORFLOW_RUNTIME_IMAGE, UPLOAD_SECRET,
};
pub use document::{
    artifact_path, ArtifactEntry, CompiledGraph, GraphDocument, SlotEntry, StageEntry,
    SCHEMA_VERSION,
};
pub use registry::ArtifactRegistry;
