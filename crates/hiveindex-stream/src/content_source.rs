//! Canonical content lookup via `condenser_api.get_content`.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::json;

use hiveindex_core::error::IndexerError;
use hiveindex_core::handlers::ContentSource;
use hiveindex_core::types::CommentOp;
use hiveindex_rpc::{call, RpcTransport};

/// The fields of a `get_content` result the pipeline uses.
#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    author: String,
    #[serde(default)]
    permlink: String,
    #[serde(default)]
    parent_author: String,
    #[serde(default)]
    parent_permlink: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    json_metadata: String,
    #[serde(default)]
    created: String,
}

/// Fetches canonical comment content from a random API node.
///
/// Failures are returned as-is; the comment handler owns the retry policy.
/// Nodes are never removed here, so the block source's failover pool is
/// left untouched.
pub struct RpcContentSource {
    nodes: Vec<Arc<dyn RpcTransport>>,
}

impl RpcContentSource {
    pub fn new(nodes: Vec<Arc<dyn RpcTransport>>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl ContentSource for RpcContentSource {
    async fn fetch_content(&self, author: &str, permlink: &str) -> Result<CommentOp, IndexerError> {
        let node = self
            .nodes
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| IndexerError::Config("no API nodes for content lookup".into()))?;

        let content: Content = call(node.as_ref(), "condenser_api.get_content", json!([author, permlink]))
            .await
            .map_err(|e| IndexerError::Transport(format!("{}: {e}", node.url())))?;

        if content.author.is_empty() {
            return Err(IndexerError::Transport(format!(
                "{}: content {author}/{permlink} not found",
                node.url()
            )));
        }

        Ok(CommentOp {
            parent_author: content.parent_author,
            parent_permlink: content.parent_permlink,
            author: content.author,
            permlink: content.permlink,
            title: content.title,
            body: content.body,
            json_metadata: content.json_metadata,
            timestamp: content.created,
        })
    }
}
