//! hiveindex-stream — Hive block source, ingestion loop and background tasks.

pub mod builder;
pub mod content_source;
pub mod fetcher;
pub mod heartbeat;
pub mod index_loop;
pub mod mutes;

pub use builder::IndexerBuilder;
pub use content_source::RpcContentSource;
pub use fetcher::BlockSource;
pub use heartbeat::Heartbeat;
pub use index_loop::{CycleReport, IngestionLoop, LoopExit};
pub use mutes::MuteSync;
