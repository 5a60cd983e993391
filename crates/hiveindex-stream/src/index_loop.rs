//! The ingestion loop — one strictly sequential cycle at a time.
//!
//! # Cycle
//! 1. Fetch and validate the window at the cursor (endpoint failover inside)
//! 2. Route operations by kind
//! 3. Run the four kind handlers concurrently
//! 4. Commit every mutation in one bulk write
//! 5. Persist the checkpoint, then advance the in-memory cursor
//! 6. Spawn the heartbeat ping
//!
//! Any fatal error leaves the checkpoint untouched and is returned to the
//! caller, which exits; a restart replays the window, which is safe because
//! every mutation is idempotent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hiveindex_core::checkpoint::{CheckpointManager, CheckpointStore};
use hiveindex_core::commit::BulkCommitter;
use hiveindex_core::cursor::Cursor;
use hiveindex_core::error::IndexerError;
use hiveindex_core::handlers::{ContentSource, CustomJsonInterpreter, HandlerSet};
use hiveindex_core::indexer::{IndexerConfig, IndexerState};
use hiveindex_core::router::route;
use hiveindex_core::store::DocumentStore;
use hiveindex_rpc::EndpointPool;

use crate::fetcher::BlockSource;
use crate::heartbeat::Heartbeat;

/// Why [`IngestionLoop::run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The cursor reached the configured stop block.
    StopBlockReached { at: u64 },
}

/// Summary of one committed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub from: u64,
    pub blocks: u64,
    pub operations: usize,
    pub mutations: usize,
    pub elapsed: Duration,
}

/// Owns the cursor and endpoint pool for the lifetime of the process.
pub struct IngestionLoop {
    config: IndexerConfig,
    cursor: Cursor,
    pool: EndpointPool,
    source: BlockSource,
    handlers: HandlerSet,
    committer: BulkCommitter,
    checkpoint: CheckpointManager,
    heartbeat: Option<Heartbeat>,
    state: IndexerState,
}

impl IngestionLoop {
    /// Build the loop and resolve the starting cursor: the configured start
    /// block if positive, else the stored checkpoint (which must exist).
    pub async fn start(
        config: IndexerConfig,
        pool: EndpointPool,
        store: Arc<dyn DocumentStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        content: Arc<dyn ContentSource>,
    ) -> Result<Self, IndexerError> {
        if pool.is_empty() {
            return Err(IndexerError::Config("no API nodes configured".into()));
        }

        let checkpoint = CheckpointManager::new(
            checkpoints,
            config.checkpoint_index.clone(),
            config.checkpoint_id.clone(),
            config.persist_checkpoint,
        );

        let cursor = match config.start_block.filter(|b| *b > 0) {
            Some(block) => {
                tracing::info!(block, "starting from configured block");
                Cursor::new(block)
            }
            None => {
                let cp = checkpoint.load_required().await?;
                tracing::info!(block = cp.block_num, "resuming from checkpoint");
                Cursor::new(cp.block_num)
            }
        };

        Ok(Self {
            cursor,
            pool,
            source: BlockSource::new(config.window_size),
            handlers: HandlerSet::new(store.clone(), content, &config),
            committer: BulkCommitter::new(store),
            checkpoint,
            heartbeat: None,
            state: IndexerState::Idle,
            config,
        })
    }

    /// Ping `heartbeat` after every productive cycle.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Register an interpreter for `custom_json` operations with `id`.
    pub fn on_custom_json(&mut self, id: impl Into<String>, interpreter: Arc<dyn CustomJsonInterpreter>) {
        self.handlers.on_custom_json(id, interpreter);
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn state(&self) -> IndexerState {
        self.state
    }

    /// URLs of the API nodes still in the failover pool.
    pub fn endpoints(&self) -> Vec<String> {
        self.pool.urls()
    }

    /// Run one cycle. `Ok(None)` means the window lies beyond the head and
    /// nothing was done.
    pub async fn run_cycle(&mut self) -> Result<Option<CycleReport>, IndexerError> {
        let started = Instant::now();
        let from = self.cursor.block_num;

        let blocks = self.source.fetch_window(&mut self.pool, self.cursor).await?;
        if blocks.is_empty() {
            tracing::debug!(from, "window beyond head; idle");
            return Ok(None);
        }
        let count = blocks.len() as u64;

        let routed = route(&blocks);
        let mutations = self.handlers.dispatch(&routed).await?;
        self.committer.commit(&mutations).await?;

        let next = from + count;
        self.checkpoint.commit(next).await?;
        self.cursor.advance(count);

        let report = CycleReport {
            from,
            blocks: count,
            operations: routed.len(),
            mutations: mutations.len(),
            elapsed: started.elapsed(),
        };
        tracing::info!(
            from,
            to = next - 1,
            blocks = count,
            operations = report.operations,
            mutations = report.mutations,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "window committed"
        );

        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.ping(report.elapsed);
        }
        Ok(Some(report))
    }

    /// Run cycles until the stop block is reached or a fatal error occurs.
    pub async fn run(&mut self) -> Result<LoopExit, IndexerError> {
        self.state = IndexerState::Running;
        tracing::info!(
            cursor = self.cursor.block_num,
            stop = ?self.config.stop_block,
            window = self.source.window_size(),
            endpoints = self.pool.len(),
            "ingestion loop started"
        );

        loop {
            if self.cursor.reached(self.config.stop_block) {
                self.state = IndexerState::Stopped;
                tracing::info!(at = self.cursor.block_num, "stop block reached");
                return Ok(LoopExit::StopBlockReached {
                    at: self.cursor.block_num,
                });
            }

            let started = Instant::now();
            if let Err(e) = self.run_cycle().await {
                self.state = IndexerState::Error;
                tracing::error!(
                    class = e.class(),
                    cursor = self.cursor.block_num,
                    error = %e,
                    "fatal cycle error"
                );
                return Err(e);
            }
            tokio::time::sleep(self.config.wait_after(started.elapsed())).await;
        }
    }
}
