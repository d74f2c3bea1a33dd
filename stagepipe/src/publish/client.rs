//! The registry API consumed by the publisher.

use crate::errors::PublishError;
use crate::pipeline::CompiledGraph;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A pipeline entry as listed by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Registry-assigned identifier.
    pub id: String,
    /// Display name, the natural key used for idempotent publishing.
    pub display_name: String,
}

impl RegistryEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Remote pipeline registry.
///
/// Each call is a single remote operation; `create` and `append_version` are
/// expected to be atomic on the registry side.
#[async_trait]
pub trait PipelineRegistry: Send + Sync {
    /// Lists entries whose display name matches `display_name`. The registry
    /// may match loosely; callers re-check for exact equality.
    async fn list(&self, display_name: &str) -> Result<Vec<RegistryEntry>, PublishError>;

    /// Creates a new entry whose initial version is `graph`. Returns the new
    /// entry id.
    async fn create(&self, display_name: &str, graph: &CompiledGraph)
        -> Result<String, PublishError>;

    /// Uploads `graph` as a new version of entry `entry_id`. Returns the new
    /// version id.
    async fn append_version(
        &self,
        entry_id: &str,
        graph: &CompiledGraph,
        version_name: &str,
    ) -> Result<String, PublishError>;
}
