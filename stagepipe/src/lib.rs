//! # Stagepipe
//!
//! Compiles containerized ML pipeline stages into a portable graph document
//! and publishes it to a pipeline registry.
//!
//! Stagepipe provides:
//!
//! - **Typed artifact wiring**: stages declare named, typed input and output
//!   slots; the compiler resolves them into a DAG
//! - **Static validation**: missing producers, kind mismatches, duplicate
//!   producers and cycles are rejected before anything is uploaded
//! - **Deterministic output**: identical definitions compile to identical bytes
//! - **Idempotent publishing**: an existing registry entry gets a new version
//!   instead of a duplicate entry
//! - **Credential discovery**: explicit values, the workload service account,
//!   cluster route lookup and kubeconfig
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagepipe::prelude::*;
//!
//! let graph = compile(
//!     "demo",
//!     [
//!         StageDescriptor::new("extract", "python:3.11")
//!             .with_output("raw", ArtifactKind::Dataset),
//!         StageDescriptor::new("train", "python:3.11")
//!             .with_input("raw", ArtifactKind::Dataset)
//!             .with_output("model", ArtifactKind::Model),
//!     ],
//! )?;
//!
//! let result = Publisher::new(InMemoryPipelineRegistry::new())
//!     .publish("demo", &graph)
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod pipeline;
pub mod publish;
pub mod resolve;
pub mod stages;
pub mod utils;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PublishConfig;
    pub use crate::core::{Artifact, ArtifactKind};
    pub use crate::errors::{
        ContractErrorInfo, CycleDetectedError, DefinitionError, PublishError,
        ResolutionError, StagepipeError,
    };
    pub use crate::pipeline::{
        compile, fraud_detection_pipeline, CompiledGraph, GraphDocument, PipelineBuilder,
        PipelineGraph,
    };
    pub use crate::publish::{
        InMemoryPipelineRegistry, PipelineRegistry, PublishAction, PublishResult, Publisher,
    };
    pub use crate::resolve::{CredentialProvider, CredentialResolver, Credentials};
    pub use crate::stages::{EnvBinding, StageDescriptor};
    pub use crate::workflow::{compile_and_publish, PublishOutcome, RunReport};
}
