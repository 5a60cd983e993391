//! Ingestion cursor — the next block number to fetch.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// The ingestion loop's position in the chain.
///
/// `block_num` is the first block of the next window; every block below it
/// has been committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub block_num: u64,
}

impl Cursor {
    pub fn new(block_num: u64) -> Self {
        Self { block_num }
    }

    /// Block numbers of the next window of `size` blocks.
    pub fn window(&self, size: u64) -> Range<u64> {
        self.block_num..self.block_num + size
    }

    /// Move past `blocks` committed blocks.
    pub fn advance(&mut self, blocks: u64) {
        self.block_num += blocks;
    }

    /// Returns `true` once the cursor reached `stop_block`.
    pub fn reached(&self, stop_block: Option<u64>) -> bool {
        stop_block.is_some_and(|stop| self.block_num >= stop)
    }
}
