//! `custom_json` handler.
//!
//! Payload interpretation is kind-specific and pluggable: interpreters are
//! registered per `custom_json` id, and ops without an interpreter produce
//! no mutations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::KindHandler;
use crate::error::IndexerError;
use crate::mutation::DocumentMutation;
use crate::types::CustomJsonOp;

/// Interprets the payload of one family of `custom_json` operations.
#[async_trait]
pub trait CustomJsonInterpreter: Send + Sync {
    async fn interpret(&self, op: &CustomJsonOp) -> Result<Vec<DocumentMutation>, IndexerError>;
}

/// Interpreter that ignores every payload.
pub struct NoopInterpreter;

#[async_trait]
impl CustomJsonInterpreter for NoopInterpreter {
    async fn interpret(&self, _op: &CustomJsonOp) -> Result<Vec<DocumentMutation>, IndexerError> {
        Ok(vec![])
    }
}

#[derive(Default)]
pub struct CustomJsonHandler {
    interpreters: HashMap<String, Arc<dyn CustomJsonInterpreter>>,
}

impl CustomJsonHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `interpreter` for ops whose id is `id`.
    pub fn on(&mut self, id: impl Into<String>, interpreter: Arc<dyn CustomJsonInterpreter>) {
        self.interpreters.insert(id.into(), interpreter);
    }
}

#[async_trait]
impl KindHandler<CustomJsonOp> for CustomJsonHandler {
    async fn mutations(&self, ops: &[CustomJsonOp]) -> Result<Vec<DocumentMutation>, IndexerError> {
        let mut out = Vec::new();
        for op in ops {
            if let Some(interpreter) = self.interpreters.get(&op.id) {
                out.extend(interpreter.interpret(op).await?);
            }
        }
        Ok(out)
    }

    fn kind(&self) -> &'static str {
        "custom_json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutation::DocumentTarget;
    use serde_json::{json, Value};

    struct FollowInterpreter;

    #[async_trait]
    impl CustomJsonInterpreter for FollowInterpreter {
        async fn interpret(&self, op: &CustomJsonOp) -> Result<Vec<DocumentMutation>, IndexerError> {
            let Some(signer) = op.required_posting_auths.first() else { return Ok(vec![]) };
            let payload: Value = serde_json::from_str(&op.json).unwrap_or(Value::Null);
            Ok(vec![DocumentMutation::upsert(
                DocumentTarget::new("follows", signer),
                json!({ "payload": payload }),
            )])
        }
    }

    fn op(id: &str, json: &str) -> CustomJsonOp {
        CustomJsonOp {
            required_auths: vec![],
            required_posting_auths: vec!["alice".into()],
            id: id.into(),
            json: json.into(),
            timestamp: "2024-01-01T00:00:00".into(),
        }
    }

    #[tokio::test]
    async fn routes_by_id() {
        let mut h = CustomJsonHandler::new();
        h.on("follow", Arc::new(FollowInterpreter));
        h.on("community", Arc::new(NoopInterpreter));

        let out = h
            .mutations(&[op("follow", r#"["follow", {}]"#), op("community", "{}"), op("unknown", "{}")])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, DocumentTarget::new("follows", "alice"));
    }
}
