//! Document mutations — the unit of work handed to the bulk committer.
//!
//! Every mutation is an "update with upsert" against one `(index, id)`.
//! Bodies are either a partial document merged into the existing source, or
//! an update script with set-append semantics, so replaying a window is
//! always safe.

use serde_json::{json, Value};

/// Store partition + document id a mutation addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentTarget {
    pub index: String,
    pub id: String,
}

impl DocumentTarget {
    pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            id: id.into(),
        }
    }
}

/// Update scripts understood by every store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateScript {
    /// Replace the volatile `jobs` field with an empty map.
    ResetJobs,
    /// Append `value` to the list in `field` unless already present;
    /// a repeated append is a no-op.
    AppendUnique { field: String, value: String },
}

const RESET_JOBS_SOURCE: &str = "ctx._source.jobs = [:]";

const APPEND_UNIQUE_SOURCE: &str = "if(!ctx._source.containsKey(params.target)){ctx._source[params.target]=[];} \
     if(ctx._source[params.target].contains(params.voter)){ctx.op = \"none\";} \
     else {ctx._source[params.target].add(params.voter);}";

impl UpdateScript {
    /// Painless rendering used by the OpenSearch backend.
    pub fn to_painless(&self) -> Value {
        match self {
            Self::ResetJobs => json!({ "source": RESET_JOBS_SOURCE, "lang": "painless" }),
            Self::AppendUnique { field, value } => json!({
                "source": APPEND_UNIQUE_SOURCE,
                "lang": "painless",
                "params": { "voter": value, "target": field },
            }),
        }
    }
}

/// What to do with the target document.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationBody {
    /// Merge `doc` into an existing document, or insert `upsert` if missing.
    Merge { doc: Value, upsert: Value },
    /// Run `script` on an existing document, or insert `upsert` if missing.
    /// Without an upsert, a missing document is a write error.
    Script {
        script: UpdateScript,
        upsert: Option<Value>,
    },
}

/// One `(target, body)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMutation {
    pub target: DocumentTarget,
    pub body: MutationBody,
}

impl DocumentMutation {
    /// Merge `doc` / insert `upsert`.
    pub fn merge(target: DocumentTarget, doc: Value, upsert: Value) -> Self {
        Self {
            target,
            body: MutationBody::Merge { doc, upsert },
        }
    }

    /// Merge the same body as both partial doc and upsert.
    pub fn upsert(target: DocumentTarget, doc: Value) -> Self {
        Self::merge(target, doc.clone(), doc)
    }

    /// Clear the volatile job state of a content document.
    pub fn reset_jobs(target: DocumentTarget) -> Self {
        Self {
            target,
            body: MutationBody::Script {
                script: UpdateScript::ResetJobs,
                upsert: Some(json!({ "jobs": null })),
            },
        }
    }

    /// Append `value` to the set-valued `field` of an existing document.
    pub fn append_unique(target: DocumentTarget, field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            target,
            body: MutationBody::Script {
                script: UpdateScript::AppendUnique {
                    field: field.into(),
                    value: value.into(),
                },
                upsert: None,
            },
        }
    }

    /// Record `account`'s latest activity on its profile document.
    pub fn last_active(accounts_index: &str, account: &str, timestamp: &str) -> Self {
        Self::merge(
            DocumentTarget::new(accounts_index, account),
            json!({ "last_active": timestamp }),
            json!({ "name": account, "last_active": timestamp }),
        )
    }

    /// The bulk action line: `{"update": {"_index": …, "_id": …}}`.
    pub fn action_line(&self) -> Value {
        json!({ "update": { "_index": self.target.index, "_id": self.target.id } })
    }

    /// The bulk body line that follows the action line.
    pub fn body_line(&self) -> Value {
        match &self.body {
            MutationBody::Merge { doc, upsert } => json!({ "doc": doc, "upsert": upsert }),
            MutationBody::Script { script, upsert } => {
                let mut body = json!({ "script": script.to_painless() });
                if let Some(upsert) = upsert {
                    body["upsert"] = upsert.clone();
                }
                body
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_active_lines() {
        let m = DocumentMutation::last_active("hive-accounts", "alice", "2024-01-01T00:00:00");
        assert_eq!(
            m.action_line(),
            json!({"update": {"_index": "hive-accounts", "_id": "alice"}})
        );
        assert_eq!(
            m.body_line(),
            json!({
                "doc": {"last_active": "2024-01-01T00:00:00"},
                "upsert": {"name": "alice", "last_active": "2024-01-01T00:00:00"}
            })
        );
    }

    #[test]
    fn append_has_params_and_no_upsert() {
        let m = DocumentMutation::append_unique(DocumentTarget::new("i", "x"), "upvotes", "bob");
        let body = m.body_line();
        assert_eq!(body["script"]["params"]["voter"], "bob");
        assert_eq!(body["script"]["params"]["target"], "upvotes");
        assert!(body.get("upsert").is_none());
    }

    #[test]
    fn reset_jobs_upserts_null() {
        let body = DocumentMutation::reset_jobs(DocumentTarget::new("i", "x")).body_line();
        assert_eq!(body["script"]["source"], RESET_JOBS_SOURCE);
        assert_eq!(body["upsert"], json!({"jobs": null}));
    }
}
