//! Bulk committer — applies one cycle's mutations in a single batched write.

use std::sync::Arc;

use crate::error::IndexerError;
use crate::mutation::DocumentMutation;
use crate::store::{BulkOutcome, DocumentStore};

/// Writes a cycle's merged mutation list to the document store.
pub struct BulkCommitter {
    store: Arc<dyn DocumentStore>,
}

impl BulkCommitter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Commit `mutations`. An empty list performs no store call.
    ///
    /// Any per-item failure is fatal: the failed items are logged and the
    /// cycle must not advance its checkpoint.
    pub async fn commit(&self, mutations: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
        if mutations.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let outcome = self.store.bulk(mutations).await?;
        if outcome.has_errors() {
            for failure in &outcome.failures {
                tracing::error!(
                    index = %failure.target.index,
                    id = %failure.target.id,
                    reason = %failure.reason,
                    "bulk item failed"
                );
            }
            return Err(IndexerError::StoreWrite(format!(
                "{} of {} bulk items failed on {}",
                outcome.failures.len(),
                mutations.len(),
                self.store.name()
            )));
        }

        tracing::debug!(
            store = self.store.name(),
            applied = outcome.applied,
            noops = outcome.noops,
            "bulk committed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DocumentId;
    use crate::mutation::DocumentTarget;
    use crate::store::BulkFailure;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct RecordingStore {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn locate(&self, _: &str, _: &[DocumentId]) -> Result<HashMap<DocumentId, String>, IndexerError> {
            Ok(HashMap::new())
        }

        async fn bulk(&self, mutations: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let failures = if self.fail {
                vec![BulkFailure {
                    target: mutations[0].target.clone(),
                    reason: "document_missing_exception".into(),
                }]
            } else {
                vec![]
            };
            Ok(BulkOutcome {
                applied: mutations.len() - failures.len(),
                noops: 0,
                failures,
            })
        }

        async fn set_field_where(&self, _: &str, _: &[(&str, &str)], _: &str, _: Value) -> Result<u64, IndexerError> {
            Ok(0)
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn mutation() -> DocumentMutation {
        DocumentMutation::upsert(DocumentTarget::new("i", "1"), json!({"a": 1}))
    }

    #[tokio::test]
    async fn empty_commit_skips_store() {
        let store = Arc::new(RecordingStore { calls: AtomicU32::new(0), fail: false });
        let committer = BulkCommitter::new(store.clone());
        committer.commit(&[]).await.unwrap();
        assert_eq!(store.calls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn item_failure_is_store_write_error() {
        let store = Arc::new(RecordingStore { calls: AtomicU32::new(0), fail: true });
        let committer = BulkCommitter::new(store.clone());
        let err = committer.commit(&[mutation(), mutation()]).await.unwrap_err();
        assert!(matches!(err, IndexerError::StoreWrite(_)));
        assert!(err.is_fatal());
        assert_eq!(store.calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn successful_commit_reports_outcome() {
        let store = Arc::new(RecordingStore { calls: AtomicU32::new(0), fail: false });
        let outcome = BulkCommitter::new(store).commit(&[mutation()]).await.unwrap();
        assert_eq!(outcome.applied, 1);
    }
}
