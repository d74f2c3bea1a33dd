//! Publishing compiled graphs to a remote pipeline registry.
//!
//! Publishing is idempotent at the entry level: the registry is searched by
//! display name, and a match gets a new version instead of a second entry.
//! Versions are never deduplicated.

mod client;
mod http;
mod memory;
mod publisher;

pub use client::{PipelineRegistry, RegistryEntry};
pub use http::{display_name_filter, normalize_endpoint, HttpPipelineRegistry, HttpRegistryOptions};
pub use memory::{InMemoryPipelineRegistry, StoredEntry, StoredVersion};
pub use publisher::{find_entry, publish, PublishAction, PublishResult, Publisher};
