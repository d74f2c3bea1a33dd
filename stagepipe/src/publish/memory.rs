//! In-memory pipeline registry.

use super::client::{PipelineRegistry, RegistryEntry};
use crate::errors::PublishError;
use crate::pipeline::CompiledGraph;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One stored version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    /// Version id.
    pub id: String,
    /// Version name.
    pub name: String,
    /// Digest of the uploaded document.
    pub digest: String,
}

/// One stored entry with all its versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// Entry id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Versions, oldest first.
    pub versions: Vec<StoredVersion>,
}

#[derive(Debug, Default)]
struct State {
    entries: Vec<StoredEntry>,
    next_id: u64,
    failures: HashMap<&'static str, PublishError>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn take_failure(&mut self, operation: &'static str) -> Result<(), PublishError> {
        match self.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A registry held in memory.
///
/// Listing matches display names case-insensitively, like a registry backed
/// by a case-insensitive database collation; the publisher is responsible for
/// the exact comparison. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPipelineRegistry {
    state: Arc<Mutex<State>>,
}

impl InMemoryPipelineRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call to `operation` ("list", "create",
    /// "`append_version`") fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: PublishError) {
        self.state.lock().failures.insert(operation, error);
    }

    /// Returns a snapshot of every stored entry.
    #[must_use]
    pub fn entries(&self) -> Vec<StoredEntry> {
        self.state.lock().entries.clone()
    }

    /// Returns the entries whose display name is exactly `display_name`.
    #[must_use]
    pub fn entries_named(&self, display_name: &str) -> Vec<StoredEntry> {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| e.display_name == display_name)
            .cloned()
            .collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if the registry holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}

#[async_trait]
impl PipelineRegistry for InMemoryPipelineRegistry {
    async fn list(&self, display_name: &str) -> Result<Vec<RegistryEntry>, PublishError> {
        let mut state = self.state.lock();
        state.take_failure("list")?;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.display_name.eq_ignore_ascii_case(display_name))
            .map(|e| RegistryEntry::new(&e.id, &e.display_name))
            .collect())
    }

    async fn create(
        &self,
        display_name: &str,
        graph: &CompiledGraph,
    ) -> Result<String, PublishError> {
        let mut state = self.state.lock();
        state.take_failure("create")?;

        let entry_id = state.next_id("pipeline");
        let version_id = state.next_id("version");
        state.entries.push(StoredEntry {
            id: entry_id.clone(),
            display_name: display_name.to_string(),
            versions: vec![StoredVersion {
                id: version_id,
                name: display_name.to_string(),
                digest: graph.digest(),
            }],
        });
        Ok(entry_id)
    }

    async fn append_version(
        &self,
        entry_id: &str,
        graph: &CompiledGraph,
        version_name: &str,
    ) -> Result<String, PublishError> {
        let mut state = self.state.lock();
        state.take_failure("append_version")?;

        let version_id = state.next_id("version");
        let Some(entry) = state.entries.iter_mut().find(|e| e.id == entry_id) else {
            return Err(PublishError::Remote {
                operation: "append_version",
                status: 404,
                body: format!("pipeline {entry_id} not found"),
            });
        };
        if entry.versions.iter().any(|v| v.name == version_name) {
            return Err(PublishError::Remote {
                operation: "append_version",
                status: 409,
                body: format!("version {version_name} already exists"),
            });
        }
        entry.versions.push(StoredVersion {
            id: version_id.clone(),
            name: version_name.to_string(),
            digest: graph.digest(),
        });
        Ok(version_id)
    }
}
