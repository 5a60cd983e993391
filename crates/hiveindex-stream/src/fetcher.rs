//! Hive block source.
//!
//! One cycle asks a single API node for every block of the window in one
//! batched `condenser_api.get_ops_in_block` call. A node that fails,
//! answers with a non-2xx status, or returns a body that is not a
//! well-formed per-block array is removed from the pool and the request is
//! retried on another node. The loop is bounded by the pool size.
//!
//! A fetched window is validated before anything downstream sees it:
//! trailing empty blocks lie beyond the head and are trimmed; an empty
//! block followed by a non-empty one is a chain anomaly.

use std::ops::Range;

use serde::Deserialize;
use serde_json::{json, Value};

use hiveindex_core::cursor::Cursor;
use hiveindex_core::error::IndexerError;
use hiveindex_core::types::{Block, Operation};
use hiveindex_rpc::{EndpointPool, JsonRpcRequest, JsonRpcResponse, TransportError};

const GET_OPS_IN_BLOCK: &str = "condenser_api.get_ops_in_block";

/// One `(timestamp, op)` entry of `get_ops_in_block`.
#[derive(Debug, Deserialize)]
struct OpEntry {
    #[serde(default)]
    timestamp: String,
    op: (String, Value),
}

/// Fetches and validates windows of blocks.
pub struct BlockSource {
    window_size: u64,
}

impl BlockSource {
    pub fn new(window_size: u64) -> Self {
        Self {
            window_size: window_size.max(1),
        }
    }

    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Fetch the window starting at `cursor`.
    ///
    /// Returns the validated blocks in chain order, starting at `cursor`;
    /// an empty list means the whole window lies beyond the head.
    pub async fn fetch_window(&self, pool: &mut EndpointPool, cursor: Cursor) -> Result<Vec<Block>, IndexerError> {
        let range = cursor.window(self.window_size);
        let requests = window_requests(&range);

        let mut last_failure: Option<(String, TransportError)> = None;
        loop {
            let endpoint = match pool.pick() {
                Ok(endpoint) => endpoint,
                Err(_) => {
                    return Err(match last_failure {
                        Some((endpoint, TransportError::Malformed(reason))) => {
                            IndexerError::Protocol { endpoint, reason }
                        }
                        Some((endpoint, err)) => IndexerError::Transport(format!(
                            "endpoint pool exhausted fetching {}..{}; last failure from {endpoint}: {err}",
                            range.start, range.end
                        )),
                        None => IndexerError::Transport("endpoint pool is empty".into()),
                    });
                }
            };
            let url = endpoint.url().to_string();

            let result = match endpoint.send_batch(requests.clone()).await {
                Ok(responses) => parse_window(&range, responses),
                Err(err) => Err(err),
            };

            match result {
                Ok(blocks) => {
                    tracing::debug!(endpoint = %url, from = range.start, to = range.end, "window fetched");
                    return validate_window(&range, blocks);
                }
                Err(err) => {
                    pool.remove(&url);
                    tracing::warn!(
                        endpoint = %url,
                        from = range.start,
                        to = range.end,
                        remaining = pool.len(),
                        error = %err,
                        "endpoint failed; removed from pool"
                    );
                    last_failure = Some((url, err));
                }
            }
        }
    }
}

/// One request per block, ids `0..n` in block order.
fn window_requests(range: &Range<u64>) -> Vec<JsonRpcRequest> {
    range
        .clone()
        .enumerate()
        .map(|(i, number)| JsonRpcRequest::new(i as u64, GET_OPS_IN_BLOCK, json!([number, false])))
        .collect()
}

/// Match batch responses back to block numbers and decode their entries.
fn parse_window(range: &Range<u64>, responses: Vec<JsonRpcResponse>) -> Result<Vec<Block>, TransportError> {
    let expected = (range.end - range.start) as usize;
    if responses.len() != expected {
        return Err(TransportError::Malformed(format!(
            "expected {expected} batch elements, got {}",
            responses.len()
        )));
    }

    let mut slots: Vec<Option<Vec<Operation>>> = vec![None; expected];
    for (position, response) in responses.into_iter().enumerate() {
        let slot = response.id.as_number().map_or(position, |id| id as usize);
        if slot >= expected || slots[slot].is_some() {
            return Err(TransportError::Malformed(format!("unexpected batch id {}", response.id)));
        }
        let result = response.into_result().map_err(TransportError::Rpc)?;
        slots[slot] = Some(decode_entries(result)?);
    }

    Ok(slots
        .into_iter()
        .zip(range.clone())
        .map(|(ops, number)| Block::new(number, ops.unwrap_or_default()))
        .collect())
}

fn decode_entries(result: Value) -> Result<Vec<Operation>, TransportError> {
    let entries: Vec<OpEntry> = match result {
        Value::Array(_) => serde_json::from_value(result)
            .map_err(|e| TransportError::Malformed(format!("invalid block entry: {e}")))?,
        other => {
            return Err(TransportError::Malformed(format!(
                "block result is not an array: {}",
                short(&other)
            )))
        }
    };
    entries
        .into_iter()
        .map(|entry| {
            let (kind, payload) = entry.op;
            Operation::from_pair(&kind, payload, &entry.timestamp)
                .map_err(|e| TransportError::Malformed(format!("invalid {kind} operation: {e}")))
        })
        .collect()
}

fn short(value: &Value) -> String {
    let s = value.to_string();
    match s.char_indices().nth(120) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s,
    }
}

/// Trim trailing empty blocks and reject any empty block left inside.
///
/// A window whose last blocks are empty is not an anomaly: the node answers
/// blocks past the head with an empty list, so those blocks are left for a
/// later cycle.
pub fn validate_window(range: &Range<u64>, mut blocks: Vec<Block>) -> Result<Vec<Block>, IndexerError> {
    let retained = blocks.iter().rposition(|b| !b.is_empty()).map_or(0, |last| last + 1);
    blocks.truncate(retained);

    let empty = blocks.iter().filter(|b| b.is_empty()).count();
    if empty > 0 {
        tracing::error!(
            from = range.start,
            to = range.end,
            empty,
            "empty block inside a non-empty window"
        );
        return Err(IndexerError::ChainAnomaly {
            from: range.start,
            to: range.end,
            empty,
        });
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hiveindex_rpc::RpcTransport;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Node that serves `blocks[n - first]` for block `n`, or fails.
    struct MockNode {
        url: String,
        first: u64,
        blocks: Vec<Value>,
        fail: bool,
        calls: AtomicU32,
    }

    #[async_trait]
    impl RpcTransport for MockNode {
        async fn send(&self, _req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            Err(TransportError::Http("single calls unsupported".into()))
        }

        async fn send_batch(&self, reqs: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, TransportError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(TransportError::Status { status: 502, body: "bad gateway".into() });
            }
            Ok(reqs
                .iter()
                .map(|r| {
                    let n = r.params[0].as_u64().unwrap();
                    let block = self.blocks.get((n - self.first) as usize).cloned().unwrap_or(json!([]));
                    JsonRpcResponse::ok(r.id.as_number().unwrap(), block)
                })
                .rev()
                .collect())
        }

        fn url(&self) -> &str {
            &self.url
        }
    }

    fn node(url: &str, first: u64, blocks: Vec<Value>, fail: bool) -> Arc<MockNode> {
        Arc::new(MockNode {
            url: url.into(),
            first,
            blocks,
            fail,
            calls: AtomicU32::new(0),
        })
    }

    fn pool_of(nodes: &[&Arc<MockNode>]) -> EndpointPool {
        EndpointPool::new(nodes.iter().map(|n| Arc::clone(*n) as Arc<dyn RpcTransport>).collect())
    }

    fn vote_block() -> Value {
        json!([{
            "timestamp": "2024-01-01T00:00:03",
            "op": ["vote", {"voter": "bob", "author": "alice", "permlink": "p", "weight": 100}]
        }])
    }

    #[tokio::test]
    async fn fetches_window_in_block_order() {
        let n = node("https://a", 100, vec![vote_block(), vote_block(), vote_block()], false);
        let mut pool = pool_of(&[&n]);
        let blocks = BlockSource::new(3).fetch_window(&mut pool, Cursor::new(100)).await.unwrap();
        let numbers: Vec<_> = blocks.iter().map(|b| b.number).collect();
        assert_eq!(numbers, [100, 101, 102]);
        assert_eq!(blocks[0].operations[0].timestamp(), "2024-01-01T00:00:03");
    }

    #[tokio::test]
    async fn interior_empty_block_is_anomaly() {
        let n = node("https://a", 1, vec![vote_block(), json!([]), vote_block()], false);
        let mut pool = pool_of(&[&n]);
        let err = BlockSource::new(3).fetch_window(&mut pool, Cursor::new(1)).await.unwrap_err();
        assert!(matches!(err, IndexerError::ChainAnomaly { from: 1, to: 4, empty: 1 }));
    }

    #[tokio::test]
    async fn trailing_empty_blocks_are_trimmed() {
        let n = node("https://a", 1, vec![vote_block(), vote_block()], false);
        let mut pool = pool_of(&[&n]);
        let blocks = BlockSource::new(5).fetch_window(&mut pool, Cursor::new(1)).await.unwrap();
        assert_eq!(blocks.len(), 2);

        let empty = node("https://b", 1, vec![], false);
        let mut pool = pool_of(&[&empty]);
        assert!(BlockSource::new(5).fetch_window(&mut pool, Cursor::new(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_node_is_removed_and_another_tried() {
        let bad = node("https://bad", 1, vec![], true);
        let good = node("https://good", 1, vec![vote_block()], false);
        let mut pool = pool_of(&[&bad, &good]);

        let blocks = BlockSource::new(1).fetch_window(&mut pool, Cursor::new(1)).await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(bad.calls.load(Ordering::Relaxed) <= 1);
        assert_eq!(good.calls.load(Ordering::Relaxed), 1);
        if bad.calls.load(Ordering::Relaxed) == 1 {
            assert_eq!(pool.urls(), ["https://good"]);
        }
    }

    #[tokio::test]
    async fn exhausted_pool_is_fatal() {
        let (a, b) = (node("https://a", 1, vec![], true), node("https://b", 1, vec![], true));
        let mut pool = pool_of(&[&a, &b]);
        let err = BlockSource::new(2).fetch_window(&mut pool, Cursor::new(1)).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, IndexerError::Transport(_)));
        assert!(pool.is_empty());
    }

    #[test]
    fn non_array_block_is_malformed() {
        let range = 5..6;
        let err = parse_window(&range, vec![JsonRpcResponse::ok(0, json!({"ops": []}))]).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));

        let err = parse_window(&range, vec![]).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }

    #[test]
    fn responses_are_matched_by_id() {
        let range = 10..12;
        let blocks = parse_window(
            &range,
            vec![JsonRpcResponse::ok(1, json!([])), JsonRpcResponse::ok(0, vote_block())],
        )
        .unwrap();
        assert_eq!(blocks[0].number, 10);
        assert_eq!(blocks[0].operations.len(), 1);
        assert!(blocks[1].is_empty());
    }
}
