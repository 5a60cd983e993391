//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Errors that can occur during ingestion.
///
/// Every variant except [`IndexerError::ContentResolution`] terminates the
/// process; the supervisor restarts it from the last durable checkpoint.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    #[error("Chain anomaly: {empty} empty block(s) inside window {from}..{to}")]
    ChainAnomaly { from: u64, to: u64, empty: usize },

    #[error("Store write error: {0}")]
    StoreWrite(String),

    #[error("Store read error: {0}")]
    StoreRead(String),

    #[error("Could not resolve content {author}/{permlink} after {attempts} attempts: {reason}")]
    ContentResolution {
        author: String,
        permlink: String,
        attempts: u32,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error must stop the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::ContentResolution { .. })
    }

    /// Short machine-friendly class name, used as a structured log field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol { .. } => "protocol",
            Self::ChainAnomaly { .. } => "chain_anomaly",
            Self::StoreWrite(_) => "store_write",
            Self::StoreRead(_) => "store_read",
            Self::ContentResolution { .. } => "content_resolution",
            Self::Config(_) => "config",
            Self::Other(_) => "other",
        }
    }
}
