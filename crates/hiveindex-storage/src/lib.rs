//! hiveindex-storage — document store backends for HiveIndex.
//!
//! Backends:
//! - [`memory`] — in-memory (tests, `--dry-run`, no persistence)
//! - [`opensearch`] — OpenSearch over HTTP (`_bulk`, `_search`, `_update`)

pub mod memory;

#[cfg(feature = "opensearch")]
pub mod opensearch;

pub use memory::InMemoryStore;

#[cfg(feature = "opensearch")]
pub use opensearch::{OpenSearchConfig, OpenSearchStore};
