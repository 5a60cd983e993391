//! Checkpoint manager — persists the ingestion position for crash recovery.
//!
//! The checkpoint is a single `{ "block_num": n }` record. It is written only
//! after the window ending at `n` has been committed, so on restart the
//! loop resumes at the first uncommitted block.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;

/// A persisted checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// First block that has not been committed yet.
    pub block_num: u64,
}

/// Trait for storing and loading checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint record `id` from `index`.
    async fn load(&self, index: &str, id: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) the checkpoint record `id` in `index`.
    async fn save(&self, index: &str, id: &str, checkpoint: Checkpoint) -> Result<(), IndexerError>;
}

/// Manages checkpoint reads/writes for the ingestion loop.
pub struct CheckpointManager {
    store: Arc<dyn CheckpointStore>,
    index: String,
    id: String,
    /// When `false`, saves are skipped and the cursor lives only in memory.
    persist: bool,
}

impl CheckpointManager {
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        index: impl Into<String>,
        id: impl Into<String>,
        persist: bool,
    ) -> Self {
        Self {
            store,
            index: index.into(),
            id: id.into(),
            persist,
        }
    }

    /// Load the saved checkpoint (returns `None` if none exists).
    pub async fn load(&self) -> Result<Option<Checkpoint>, IndexerError> {
        self.store.load(&self.index, &self.id).await
    }

    /// Load the checkpoint, treating a missing record as fatal.
    pub async fn load_required(&self) -> Result<Checkpoint, IndexerError> {
        self.load().await?.ok_or_else(|| {
            IndexerError::StoreRead(format!(
                "checkpoint {}/{} not found; pass a start block or seed the record",
                self.index, self.id
            ))
        })
    }

    /// Record that every block below `block_num` is committed.
    pub async fn commit(&self, block_num: u64) -> Result<(), IndexerError> {
        if !self.persist {
            tracing::debug!(block_num, "checkpoint persistence disabled; skipping save");
            return Ok(());
        }
        self.store
            .save(&self.index, &self.id, Checkpoint { block_num })
            .await
    }

    pub fn is_persistent(&self) -> bool {
        self.persist
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory checkpoint store for tests and dry runs.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    data: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(index: &str, id: &str) -> String {
        format!("{index}/{id}")
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, index: &str, id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.data.lock().unwrap().get(&Self::key(index, id)).copied())
    }

    async fn save(&self, index: &str, id: &str, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.data.lock().unwrap().insert(Self::key(index, id), checkpoint);
        Ok(())
    }
}
