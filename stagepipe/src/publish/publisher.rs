//! Idempotent publishing: look up by display name, then create or append.

use super::client::{PipelineRegistry, RegistryEntry};
use super::http::{HttpPipelineRegistry, HttpRegistryOptions};
use crate::errors::PublishError;
use crate::pipeline::CompiledGraph;
use crate::utils::{UnixSecondsStamp, VersionStamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// What a publish did to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishAction {
    /// A new entry was created with the graph as its first version.
    Create,
    /// The graph was appended as a new version of an existing entry.
    AppendVersion,
}

impl fmt::Display for PublishAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::AppendVersion => write!(f, "append_version"),
        }
    }
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    /// The display name published under.
    pub display_name: String,
    /// What was done.
    pub action: PublishAction,
    /// The registry entry id.
    pub entry_id: String,
    /// The new version id, for appended versions.
    pub version_id: Option<String>,
    /// The new version name, for appended versions.
    pub version_name: Option<String>,
    /// SHA-256 of the uploaded document.
    pub graph_digest: String,
}

/// Picks the first entry whose display name is exactly `display_name`.
#[must_use]
pub fn find_entry<'a>(entries: &'a [RegistryEntry], display_name: &str) -> Option<&'a RegistryEntry> {
    entries.iter().find(|e| e.display_name == display_name)
}

/// Publishes compiled graphs to a registry.
///
/// Callers must not publish the same display name concurrently; two racing
/// publishers can both observe "no entry" and both create one.
pub struct Publisher<R> {
    registry: R,
    stamps: Box<dyn VersionStamp>,
}

impl<R: PipelineRegistry> Publisher<R> {
    /// Creates a publisher using Unix-second version stamps.
    #[must_use]
    pub fn new(registry: R) -> Self {
        Self::with_stamps(registry, Box::new(UnixSecondsStamp::new()))
    }

    /// Creates a publisher with a custom version stamp source.
    #[must_use]
    pub fn with_stamps(registry: R, stamps: Box<dyn VersionStamp>) -> Self {
        Self { registry, stamps }
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Version name for the next append under `display_name`.
    fn next_version_name(&self, display_name: &str) -> String {
        format!("{display_name}-{}", self.stamps.next_stamp())
    }

    /// Publishes `graph` under `display_name`.
    ///
    /// # Errors
    ///
    /// Returns the first [`PublishError`] from the registry. Nothing is
    /// retried; the whole publish may be retried by the caller.
    pub async fn publish(
        &self,
        display_name: &str,
        graph: &CompiledGraph,
    ) -> Result<PublishResult, PublishError> {
        let graph_digest = graph.digest();
        let entries = self.registry.list(display_name).await?;

        let result = match find_entry(&entries, display_name) {
            None => {
                info!(display_name = %display_name, "Pipeline does not exist, creating it");
                let entry_id = self.registry.create(display_name, graph).await?;
                PublishResult {
                    display_name: display_name.to_string(),
                    action: PublishAction::Create,
                    entry_id,
                    version_id: None,
                    version_name: None,
                    graph_digest,
                }
            }
            Some(entry) => {
                let version_name = self.next_version_name(display_name);
                info!(
                    display_name = %display_name,
                    entry_id = %entry.id,
                    version_name = %version_name,
                    "Pipeline already exists, uploading a new version"
                );
                let version_id = self
                    .registry
                    .append_version(&entry.id, graph, &version_name)
                    .await?;
                PublishResult {
                    display_name: display_name.to_string(),
                    action: PublishAction::AppendVersion,
                    entry_id: entry.id.clone(),
                    version_id: Some(version_id),
                    version_name: Some(version_name),
                    graph_digest,
                }
            }
        };

        info!(
            display_name = %display_name,
            action = %result.action,
            entry_id = %result.entry_id,
            digest = %result.graph_digest,
            "Pipeline published"
        );
        Ok(result)
    }
}

/// Publishes `graph` to the registry at `endpoint` using `token`.
///
/// # Errors
///
/// Returns a [`PublishError`] if the endpoint is invalid or any registry
/// call fails.
pub async fn publish(
    display_name: &str,
    graph: &CompiledGraph,
    endpoint: &str,
    token: &str,
    options: &HttpRegistryOptions,
) -> Result<PublishResult, PublishError> {
    let registry = HttpPipelineRegistry::new(endpoint, token, options)?;
    Publisher::new(registry).publish(display_name, graph).await
}
