//! Shared types for the ingestion pipeline.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Operations ───────────────────────────────────────────────────────────────

/// A `comment` operation: a top-level post or a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentOp {
    #[serde(default)]
    pub parent_author: String,
    #[serde(default)]
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    /// Raw metadata string as broadcast (usually JSON, sometimes empty).
    #[serde(default)]
    pub json_metadata: String,
    /// Timestamp of the containing block (`YYYY-MM-DDTHH:MM:SS`).
    #[serde(default)]
    pub timestamp: String,
}

impl CommentOp {
    /// Returns `true` for posts (no parent author), `false` for replies.
    pub fn is_top_level(&self) -> bool {
        self.parent_author.is_empty()
    }
}

/// A `vote` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOp {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    /// Signed weight; positive for upvotes, zero or negative for downvotes.
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub timestamp: String,
}

/// A `custom_json` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomJsonOp {
    #[serde(default)]
    pub required_auths: Vec<String>,
    #[serde(default)]
    pub required_posting_auths: Vec<String>,
    pub id: String,
    #[serde(default)]
    pub json: String,
    #[serde(default)]
    pub timestamp: String,
}

/// An `account_update` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUpdateOp {
    pub account: String,
    #[serde(default)]
    pub json_metadata: String,
    #[serde(default)]
    pub timestamp: String,
}

/// A chain operation, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Comment(CommentOp),
    Vote(VoteOp),
    CustomJson(CustomJsonOp),
    AccountUpdate(AccountUpdateOp),
    /// Any kind the pipeline does not index.
    Other { kind: String, timestamp: String },
}

impl Operation {
    /// Build an operation from a `[kind, payload]` pair, stamping it with the
    /// timestamp of the entry that contained it.
    pub fn from_pair(kind: &str, payload: Value, timestamp: &str) -> Result<Self, serde_json::Error> {
        let op = match kind {
            "comment" => {
                let mut op: CommentOp = serde_json::from_value(payload)?;
                op.timestamp = timestamp.to_string();
                Self::Comment(op)
            }
            "vote" => {
                let mut op: VoteOp = serde_json::from_value(payload)?;
                op.timestamp = timestamp.to_string();
                Self::Vote(op)
            }
            "custom_json" => {
                let mut op: CustomJsonOp = serde_json::from_value(payload)?;
                op.timestamp = timestamp.to_string();
                Self::CustomJson(op)
            }
            "account_update" => {
                let mut op: AccountUpdateOp = serde_json::from_value(payload)?;
                op.timestamp = timestamp.to_string();
                Self::AccountUpdate(op)
            }
            other => Self::Other {
                kind: other.to_string(),
                timestamp: timestamp.to_string(),
            },
        };
        Ok(op)
    }

    /// The operation kind as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Self::Comment(_) => "comment",
            Self::Vote(_) => "vote",
            Self::CustomJson(_) => "custom_json",
            Self::AccountUpdate(_) => "account_update",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Timestamp propagated from the containing block entry.
    pub fn timestamp(&self) -> &str {
        match self {
            Self::Comment(op) => &op.timestamp,
            Self::Vote(op) => &op.timestamp,
            Self::CustomJson(op) => &op.timestamp,
            Self::AccountUpdate(op) => &op.timestamp,
            Self::Other { timestamp, .. } => timestamp,
        }
    }
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// All operations of one block, in chain order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub operations: Vec<Operation>,
}

impl Block {
    pub fn new(number: u64, operations: Vec<Operation>) -> Self {
        Self { number, operations }
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
