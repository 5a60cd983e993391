//! Fluent builder API for ingestion loop configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use hiveindex_stream::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .start_block(80_000_000)
//!     .stop_block(80_100_000)
//!     .window_size(30)
//!     .persist_checkpoint(false)
//!     .build_config();
//! ```

use hiveindex_core::indexer::{CommunityConfig, IndexNames, IndexerConfig};

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Start at `block` instead of the stored checkpoint.
    pub fn start_block(mut self, block: u64) -> Self {
        self.config.start_block = Some(block);
        self
    }

    /// Stop cleanly once the cursor reaches `block`.
    pub fn stop_block(mut self, block: u64) -> Self {
        self.config.stop_block = Some(block);
        self
    }

    /// Number of blocks fetched per cycle.
    pub fn window_size(mut self, size: u64) -> Self {
        self.config.window_size = size;
        self
    }

    /// Where the checkpoint record lives.
    pub fn checkpoint(mut self, index: impl Into<String>, id: impl Into<String>) -> Self {
        self.config.checkpoint_index = index.into();
        self.config.checkpoint_id = id.into();
        self
    }

    /// Enable or disable checkpoint writes.
    pub fn persist_checkpoint(mut self, persist: bool) -> Self {
        self.config.persist_checkpoint = persist;
        self
    }

    /// Target spacing between cycles and the floor wait after an overrun.
    pub fn cycle_timing(mut self, interval_ms: u64, floor_ms: u64) -> Self {
        self.config.cycle_interval_ms = interval_ms;
        self.config.floor_wait_ms = floor_ms;
        self
    }

    /// Bounded refetch policy for already-indexed comments.
    pub fn refetch(mut self, retries: u32, delay_ms: u64) -> Self {
        self.config.refetch_retries = retries;
        self.config.refetch_delay_ms = delay_ms;
        self
    }

    pub fn indices(mut self, indices: IndexNames) -> Self {
        self.config.indices = indices;
        self
    }

    pub fn community(mut self, community: CommunityConfig) -> Self {
        self.config.community = community;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
