//! Account update handler — stateless profile upserts.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::KindHandler;
use crate::error::IndexerError;
use crate::mutation::{DocumentMutation, DocumentTarget};
use crate::types::AccountUpdateOp;

pub struct AccountUpdateHandler {
    accounts_index: String,
}

impl AccountUpdateHandler {
    pub fn new(accounts_index: impl Into<String>) -> Self {
        Self {
            accounts_index: accounts_index.into(),
        }
    }

    fn mutation(&self, op: &AccountUpdateOp) -> DocumentMutation {
        let profile = parse_profile(&op.json_metadata);
        DocumentMutation::merge(
            DocumentTarget::new(&self.accounts_index, &op.account),
            json!({ "profile": profile, "last_active": op.timestamp }),
            json!({ "name": op.account, "profile": profile, "last_active": op.timestamp }),
        )
    }
}

/// The `profile` object of account metadata; `{}` when absent or malformed.
pub fn parse_profile(json_metadata: &str) -> Value {
    serde_json::from_str::<Value>(json_metadata)
        .ok()
        .and_then(|v| v.get("profile").cloned())
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}))
}

#[async_trait]
impl KindHandler<AccountUpdateOp> for AccountUpdateHandler {
    async fn mutations(&self, ops: &[AccountUpdateOp]) -> Result<Vec<DocumentMutation>, IndexerError> {
        Ok(ops.iter().map(|op| self.mutation(op)).collect())
    }

    fn kind(&self) -> &'static str {
        "account_update"
    }
}
