//! Core domain model types for stagepipe.
//!
//! Artifacts are the typed data handles that connect stages.

mod artifact;

pub use artifact::{Artifact, ArtifactKind};
