//! Kind handlers: turn one window's operations of a kind into document
//! mutations, and the [`HandlerSet`] that runs all four concurrently.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::indexer::IndexerConfig;
use crate::mutation::DocumentMutation;
use crate::router::RoutedOperations;
use crate::store::DocumentStore;

pub mod account;
pub mod comment;
pub mod custom_json;
pub mod vote;

pub use account::AccountUpdateHandler;
pub use comment::{CommentHandler, ContentSource};
pub use custom_json::{CustomJsonHandler, CustomJsonInterpreter, NoopInterpreter};
pub use vote::VoteHandler;

/// Converts a batch of operations of one kind into mutations.
#[async_trait]
pub trait KindHandler<Op: Send + Sync>: Send + Sync {
    /// Mutations for `ops`, in operation order.
    async fn mutations(&self, ops: &[Op]) -> Result<Vec<DocumentMutation>, IndexerError>;

    /// Operation kind this handler consumes (for log output).
    fn kind(&self) -> &'static str;
}

/// The four kind handlers of one ingestion loop.
pub struct HandlerSet {
    comments: CommentHandler,
    votes: VoteHandler,
    custom_jsons: CustomJsonHandler,
    account_updates: AccountUpdateHandler,
}

impl HandlerSet {
    /// Build the handlers from the loop configuration.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        source: Arc<dyn ContentSource>,
        config: &IndexerConfig,
    ) -> Self {
        Self {
            comments: CommentHandler::new(
                store.clone(),
                source,
                config.indices.clone(),
                config.community.clone(),
            )
            .with_retries(config.refetch_retries, Duration::from_millis(config.refetch_delay_ms)),
            votes: VoteHandler::new(store, config.indices.clone()),
            custom_jsons: CustomJsonHandler::new(),
            account_updates: AccountUpdateHandler::new(config.indices.accounts.clone()),
        }
    }

    /// Register an interpreter for `custom_json` operations with `id`.
    pub fn on_custom_json(&mut self, id: impl Into<String>, interpreter: Arc<dyn CustomJsonInterpreter>) {
        self.custom_jsons.on(id, interpreter);
    }

    /// Run all four handlers concurrently and merge their output.
    ///
    /// Output order is comments, votes, custom_jsons, account updates.
    pub async fn dispatch(&self, routed: &RoutedOperations) -> Result<Vec<DocumentMutation>, IndexerError> {
        let (comments, votes, custom_jsons, account_updates) = tokio::try_join!(
            run(&self.comments, &routed.comments),
            run(&self.votes, &routed.votes),
            run(&self.custom_jsons, &routed.custom_jsons),
            run(&self.account_updates, &routed.account_updates),
        )?;

        let mut merged =
            Vec::with_capacity(comments.len() + votes.len() + custom_jsons.len() + account_updates.len());
        merged.extend(comments);
        merged.extend(votes);
        merged.extend(custom_jsons);
        merged.extend(account_updates);
        Ok(merged)
    }
}

async fn run<Op, H>(handler: &H, ops: &[Op]) -> Result<Vec<DocumentMutation>, IndexerError>
where
    Op: Send + Sync,
    H: KindHandler<Op>,
{
    if ops.is_empty() {
        return Ok(vec![]);
    }
    let mutations = handler.mutations(ops).await?;
    tracing::debug!(
        kind = handler.kind(),
        ops = ops.len(),
        mutations = mutations.len(),
        "handler finished"
    );
    Ok(mutations)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Stub collaborators shared by the handler tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::ContentSource;
    use crate::error::IndexerError;
    use crate::identity::DocumentId;
    use crate::mutation::DocumentMutation;
    use crate::store::{BulkOutcome, DocumentStore};
    use crate::types::CommentOp;

    /// Store that knows a fixed set of ids, all in one partition.
    #[derive(Default)]
    pub struct StubStore {
        pub existing: Mutex<HashSet<DocumentId>>,
        pub partition: String,
        pub locate_calls: AtomicU32,
    }

    impl StubStore {
        pub fn with(ids: impl IntoIterator<Item = DocumentId>, partition: &str) -> Self {
            Self {
                existing: Mutex::new(ids.into_iter().collect()),
                partition: partition.to_string(),
                locate_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn locate(
            &self,
            _index: &str,
            ids: &[DocumentId],
        ) -> Result<HashMap<DocumentId, String>, IndexerError> {
            self.locate_calls.fetch_add(1, Ordering::Relaxed);
            let existing = self.existing.lock().unwrap();
            Ok(ids
                .iter()
                .filter(|id| existing.contains(*id))
                .map(|id| (id.clone(), self.partition.clone()))
                .collect())
        }

        async fn bulk(&self, _m: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
            Ok(BulkOutcome::default())
        }

        async fn set_field_where(
            &self,
            _index: &str,
            _filter: &[(&str, &str)],
            _field: &str,
            _value: Value,
        ) -> Result<u64, IndexerError> {
            Ok(0)
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Content source that fails `failures` times, then returns `content`.
    pub struct StubSource {
        pub content: Option<CommentOp>,
        pub failures: AtomicU32,
        pub calls: AtomicU32,
    }

    impl StubSource {
        pub fn returning(content: CommentOp) -> Self {
            Self {
                content: Some(content),
                failures: AtomicU32::new(0),
                calls: AtomicU32::new(0),
            }
        }

        pub fn failing_times(content: Option<CommentOp>, failures: u32) -> Self {
            Self {
                content,
                failures: AtomicU32::new(failures),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ContentSource for StubSource {
        async fn fetch_content(&self, author: &str, permlink: &str) -> Result<CommentOp, IndexerError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let remaining = self.failures.load(Ordering::Relaxed);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::Relaxed);
                return Err(IndexerError::Transport(format!("{author}/{permlink}: node down")));
            }
            self.content
                .clone()
                .ok_or_else(|| IndexerError::Transport("not found".into()))
        }
    }
}
