//! Community mute sync.
//!
//! A background task, independent of the ingestion loop, that pages
//! through the community's role list and flags every content document of
//! a muted account posted in the community. It touches only the
//! `muted_in_community` field and never the cursor or checkpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::task::JoinHandle;

use hiveindex_core::error::IndexerError;
use hiveindex_core::store::DocumentStore;
use hiveindex_rpc::{call, RpcTransport};

const PAGE_SIZE: usize = 100;

/// Periodic mute flag sync for one community.
pub struct MuteSync {
    node: Arc<dyn RpcTransport>,
    store: Arc<dyn DocumentStore>,
    community: String,
    content_index: String,
    initial_delay: Duration,
    interval: Duration,
}

impl MuteSync {
    pub fn new(
        node: Arc<dyn RpcTransport>,
        store: Arc<dyn DocumentStore>,
        community: impl Into<String>,
        content_index: impl Into<String>,
    ) -> Self {
        Self {
            node,
            store,
            community: community.into(),
            content_index: content_index.into(),
            initial_delay: Duration::from_secs(5 * 60),
            interval: Duration::from_secs(60 * 60),
        }
    }

    pub fn with_schedule(mut self, initial_delay: Duration, interval: Duration) -> Self {
        self.initial_delay = initial_delay;
        self.interval = interval;
        self
    }

    /// Run forever on its own timer. Errors are logged and the next tick
    /// tries again.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(self.initial_delay).await;
            loop {
                match self.sync_once().await {
                    Ok(updated) => tracing::info!(community = %self.community, updated, "mute sync finished"),
                    Err(e) => tracing::warn!(community = %self.community, error = %e, "mute sync failed"),
                }
                tokio::time::sleep(self.interval).await;
            }
        })
    }

    /// One pass over the role list. Returns the number of documents flagged.
    pub async fn sync_once(&self) -> Result<u64, IndexerError> {
        let mut last = String::new();
        let mut updated = 0;
        loop {
            let page = self.roles_after(&last).await?;
            let Some(tail) = page.last() else { break };
            let next = tail.0.clone();

            for (account, role) in &page {
                if role != "muted" {
                    continue;
                }
                updated += self
                    .store
                    .set_field_where(
                        &self.content_index,
                        &[("author", account.as_str()), ("parent_permlink", self.community.as_str())],
                        "muted_in_community",
                        json!(true),
                    )
                    .await?;
            }

            if page.len() < PAGE_SIZE || next == last {
                break;
            }
            last = next;
        }
        Ok(updated)
    }

    /// `(account, role)` pairs listed after `last`.
    async fn roles_after(&self, last: &str) -> Result<Vec<(String, String)>, IndexerError> {
        let params = json!({ "community": self.community, "last": last, "limit": PAGE_SIZE });
        let rows: Vec<Vec<Value>> = call(self.node.as_ref(), "bridge.list_community_roles", params)
            .await
            .map_err(|e| IndexerError::Transport(format!("{}: {e}", self.node.url())))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let account = row.first()?.as_str()?.to_string();
                let role = row.get(1)?.as_str()?.to_string();
                Some((account, role))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hiveindex_core::identity::DocumentId;
    use hiveindex_core::mutation::DocumentMutation;
    use hiveindex_core::store::BulkOutcome;
    use hiveindex_rpc::{JsonRpcRequest, JsonRpcResponse, TransportError};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct RolesNode {
        roles: Vec<(String, String)>,
    }

    #[async_trait]
    impl RpcTransport for RolesNode {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            let last = req.params["last"].as_str().unwrap_or_default();
            let limit = req.params["limit"].as_u64().unwrap_or(100) as usize;
            let start = match last {
                "" => 0,
                last => self.roles.iter().position(|(a, _)| a == last).map_or(self.roles.len(), |i| i + 1),
            };
            let page: Vec<Value> = self.roles[start..]
                .iter()
                .take(limit)
                .map(|(a, r)| json!([a, r, ""]))
                .collect();
            Ok(JsonRpcResponse::ok(1, Value::Array(page)))
        }

        fn url(&self) -> &str {
            "https://roles"
        }
    }

    #[derive(Default)]
    struct FlagStore {
        flagged: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStore for FlagStore {
        async fn locate(&self, _: &str, _: &[DocumentId]) -> Result<HashMap<DocumentId, String>, IndexerError> {
            Ok(HashMap::new())
        }

        async fn bulk(&self, _: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
            Ok(BulkOutcome::default())
        }

        async fn set_field_where(
            &self,
            _index: &str,
            filter: &[(&str, &str)],
            field: &str,
            _value: Value,
        ) -> Result<u64, IndexerError> {
            assert_eq!(field, "muted_in_community");
            assert_eq!(filter[1], ("parent_permlink", "hive-118554"));
            self.flagged.lock().unwrap().push(filter[0].1.to_string());
            Ok(2)
        }

        fn name(&self) -> &str {
            "flags"
        }
    }

    #[tokio::test]
    async fn flags_only_muted_accounts_across_pages() {
        let mut roles: Vec<(String, String)> = (0..150).map(|i| (format!("user{i:03}"), "guest".to_string())).collect();
        roles[3].1 = "muted".into();
        roles[120].1 = "muted".into();
        roles[149].1 = "mod".into();

        let store = Arc::new(FlagStore::default());
        let sync = MuteSync::new(Arc::new(RolesNode { roles }), store.clone(), "hive-118554", "hive-posts");

        let updated = sync.sync_once().await.unwrap();
        assert_eq!(updated, 4);
        assert_eq!(*store.flagged.lock().unwrap(), ["user003", "user120"]);
    }

    #[tokio::test]
    async fn empty_role_list_is_noop() {
        let store = Arc::new(FlagStore::default());
        let sync = MuteSync::new(Arc::new(RolesNode { roles: vec![] }), store.clone(), "hive-118554", "hive-posts");
        assert_eq!(sync.sync_once().await.unwrap(), 0);
    }
}
