//! Indexer configuration and state types.

use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the store partitions the pipeline writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNames {
    /// Alias spanning every content partition (used for existence checks).
    pub content_alias: String,
    /// Prefix of the monthly content partitions.
    pub content_prefix: String,
    /// Profile documents, keyed by account name.
    pub accounts: String,
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            content_alias: "hive-posts".into(),
            content_prefix: "hive-post-data".into(),
            accounts: "hive-accounts".into(),
        }
    }
}

impl IndexNames {
    /// Partition for content created at `timestamp`:
    /// `{prefix}-{month}-{year}` with a zero-based month.
    ///
    /// Unparseable timestamps fall back to the current time.
    pub fn content_partition(&self, timestamp: &str) -> String {
        let (month0, year) = match parse_timestamp(timestamp) {
            Some(ts) => (ts.month0(), ts.year()),
            None => {
                tracing::warn!(timestamp, "unparseable timestamp; partitioning by current time");
                let now = Utc::now();
                (now.month0(), now.year())
            }
        };
        format!("{}-{}-{}", self.content_prefix, month0, year)
    }
}

/// Parse a chain timestamp (`2024-01-15T12:34:56`, optionally with a zone).
pub fn parse_timestamp(timestamp: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(timestamp)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// The designated community whose posts carry a derived tag string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityConfig {
    /// Community account, e.g. `hive-118554`.
    pub community: String,
    /// Plain tag that also files a post under the community.
    pub tag: String,
    /// Content field holding the derived tag string.
    pub tag_field: String,
    /// Index the reply-driven tag update is written to.
    pub reply_tag_index: String,
    /// Phrase a reply must contain to update tags.
    pub trigger_phrase: String,
    /// Accounts allowed to update tags by reply.
    pub moderators: Vec<String>,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            community: "hive-118554".into(),
            tag: "hivestockimages".into(),
            tag_field: "stockimage_tags".into(),
            reply_tag_index: "hive-post-data".into(),
            trigger_phrase: "!update-stock-image-tags".into(),
            moderators: vec![
                "hive-118554".into(),
                "minismallholding".into(),
                "crosheille".into(),
                "kattycrochet".into(),
            ],
        }
    }
}

impl CommunityConfig {
    pub fn is_moderator(&self, account: &str) -> bool {
        self.moderators.iter().any(|m| m == account)
    }

    /// Returns `true` if a post tagged `tags` under `parent_permlink`
    /// belongs to the community.
    pub fn claims(&self, tags: &[String], parent_permlink: &str) -> bool {
        let names = [self.community.as_str(), self.tag.as_str()];
        tags.iter().any(|t| names.contains(&t.as_str())) || names.contains(&parent_permlink)
    }
}

/// Configuration for an ingestion loop instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// First block to fetch; `None` resumes from the stored checkpoint.
    pub start_block: Option<u64>,
    /// Stop cleanly once the cursor reaches this block.
    pub stop_block: Option<u64>,
    /// Number of blocks requested per cycle.
    pub window_size: u64,
    /// Index holding the checkpoint record.
    pub checkpoint_index: String,
    /// Document id of the checkpoint record.
    pub checkpoint_id: String,
    /// Persist the checkpoint after every commit.
    pub persist_checkpoint: bool,
    /// Target spacing between cycle starts (milliseconds).
    pub cycle_interval_ms: u64,
    /// Minimum wait when a cycle overran the interval (milliseconds).
    pub floor_wait_ms: u64,
    /// Extra refetch attempts for an already-indexed comment.
    pub refetch_retries: u32,
    /// Delay between refetch attempts (milliseconds).
    pub refetch_delay_ms: u64,
    pub indices: IndexNames,
    pub community: CommunityConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            stop_block: None,
            window_size: 30,
            checkpoint_index: "settings".into(),
            checkpoint_id: "chain-sync-block-number".into(),
            persist_checkpoint: true,
            cycle_interval_ms: 3_000,
            floor_wait_ms: 25,
            refetch_retries: 10,
            refetch_delay_ms: 750,
            indices: IndexNames::default(),
            community: CommunityConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// How long to sleep after a cycle that took `elapsed`.
    pub fn wait_after(&self, elapsed: Duration) -> Duration {
        let interval = Duration::from_millis(self.cycle_interval_ms);
        match interval.checked_sub(elapsed) {
            Some(rest) if !rest.is_zero() => rest,
            _ => Duration::from_millis(self.floor_wait_ms),
        }
    }
}

/// Runtime state of the ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Not yet started.
    Idle,
    /// Processing windows.
    Running,
    /// Reached the configured stop block.
    Stopped,
    /// Encountered an unrecoverable error.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_uses_zero_based_month() {
        let names = IndexNames::default();
        assert_eq!(names.content_partition("2024-01-15T12:34:56"), "hive-post-data-0-2024");
        assert_eq!(names.content_partition("2023-12-31T23:59:59"), "hive-post-data-11-2023");
        assert_eq!(names.content_partition("2023-12-31T23:59:59Z"), "hive-post-data-11-2023");
    }

    #[test]
    fn community_claims_by_tag_or_parent() {
        let c = CommunityConfig::default();
        assert!(c.claims(&["hivestockimages".into()], "photography"));
        assert!(c.claims(&[], "hive-118554"));
        assert!(!c.claims(&["photography".into()], "photography"));
        assert!(c.is_moderator("crosheille"));
        assert!(!c.is_moderator("mallory"));
    }

    #[test]
    fn wait_after_respects_floor() {
        let cfg = IndexerConfig::default();
        assert_eq!(cfg.wait_after(Duration::from_millis(1_000)), Duration::from_millis(2_000));
        assert_eq!(cfg.wait_after(Duration::from_millis(5_000)), Duration::from_millis(25));
        assert_eq!(cfg.wait_after(Duration::from_millis(3_000)), Duration::from_millis(25));
    }
}
