//! Document store seam: existence reads and batched writes.
//!
//! Implementations live in `hiveindex-storage` (in-memory, OpenSearch).

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::IndexerError;
use crate::identity::DocumentId;
use crate::mutation::{DocumentMutation, DocumentTarget};

/// A single mutation the store rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFailure {
    pub target: DocumentTarget,
    pub reason: String,
}

/// Result of one batched write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Mutations that created or changed a document.
    pub applied: usize,
    /// Mutations that left the document unchanged (e.g. repeated vote).
    pub noops: usize,
    /// Mutations the store reported as failed.
    pub failures: Vec<BulkFailure>,
}

impl BulkOutcome {
    pub fn has_errors(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Read/write access to the search store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Return which of `ids` exist in `index` (an index name or alias),
    /// mapped to the concrete partition that holds each one.
    async fn locate(
        &self,
        index: &str,
        ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, String>, IndexerError>;

    /// Apply all `mutations` in one batched write.
    ///
    /// Transport-level failures are `Err`; per-mutation rejections are
    /// reported in [`BulkOutcome::failures`].
    async fn bulk(&self, mutations: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError>;

    /// Set `field = value` on every document in `index` whose fields equal
    /// all `(field, value)` pairs in `filter`. Returns the number updated.
    async fn set_field_where(
        &self,
        index: &str,
        filter: &[(&str, &str)],
        field: &str,
        value: Value,
    ) -> Result<u64, IndexerError>;

    /// Backend name for log output.
    fn name(&self) -> &str;
}
