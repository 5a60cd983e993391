//! In-memory document store.
//!
//! Applies mutations with the same semantics as the OpenSearch backend:
//! partial documents are deep-merged, scripts run against the stored
//! source, and a missing document is created from the upsert body or
//! reported as a per-item failure. Checkpoints are ordinary documents.
//! All data is lost when the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use hiveindex_core::checkpoint::{Checkpoint, CheckpointStore};
use hiveindex_core::error::IndexerError;
use hiveindex_core::identity::DocumentId;
use hiveindex_core::mutation::{DocumentMutation, MutationBody, UpdateScript};
use hiveindex_core::store::{BulkFailure, BulkOutcome, DocumentStore};

type Index = BTreeMap<String, Value>;

/// In-memory document store.
#[derive(Default)]
pub struct InMemoryStore {
    indices: Mutex<BTreeMap<String, Index>>,
    /// alias → prefix of the indices it spans
    aliases: HashMap<String, String>,
    bulk_calls: Mutex<usize>,
}

/// Result of applying one mutation.
enum Applied {
    Changed,
    Unchanged,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `alias` resolve to every index whose name starts with `prefix`.
    pub fn with_alias(mut self, alias: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.aliases.insert(alias.into(), prefix.into());
        self
    }

    /// Store `doc` under `index/id`, replacing any existing document.
    pub fn insert(&self, index: &str, id: &str, doc: Value) {
        self.indices
            .lock()
            .unwrap()
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), doc);
    }

    /// Fetch the source of `index/id`.
    pub fn get(&self, index: &str, id: &str) -> Option<Value> {
        self.indices.lock().unwrap().get(index)?.get(id).cloned()
    }

    /// Number of documents in `index`.
    pub fn doc_count(&self, index: &str) -> usize {
        self.indices.lock().unwrap().get(index).map_or(0, BTreeMap::len)
    }

    /// Full copy of the stored data, ordered by index then id.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, Value>> {
        self.indices.lock().unwrap().clone()
    }

    /// Number of `bulk` calls served so far.
    pub fn bulk_calls(&self) -> usize {
        *self.bulk_calls.lock().unwrap()
    }

    /// Concrete index names `name` refers to (itself, or an alias's members).
    fn resolve(&self, indices: &BTreeMap<String, Index>, name: &str) -> Vec<String> {
        match self.aliases.get(name) {
            Some(prefix) => indices.keys().filter(|k| k.starts_with(prefix.as_str())).cloned().collect(),
            None => vec![name.to_string()],
        }
    }

    fn apply(indices: &mut BTreeMap<String, Index>, mutation: &DocumentMutation) -> Result<Applied, String> {
        let index = indices.entry(mutation.target.index.clone()).or_default();
        let id = &mutation.target.id;

        if let Some(source) = index.get_mut(id) {
            return Ok(match &mutation.body {
                MutationBody::Merge { doc, .. } => {
                    let before = source.clone();
                    merge_into(source, doc);
                    if *source == before {
                        Applied::Unchanged
                    } else {
                        Applied::Changed
                    }
                }
                MutationBody::Script { script, .. } => run_script(source, script),
            });
        }

        let upsert = match &mutation.body {
            MutationBody::Merge { upsert, .. } => upsert,
            MutationBody::Script { upsert: Some(upsert), .. } => upsert,
            MutationBody::Script { upsert: None, .. } => {
                return Err(format!("document_missing_exception: [{id}]: document missing"))
            }
        };
        index.insert(id.clone(), upsert.clone());
        Ok(Applied::Changed)
    }
}

/// Deep-merge `patch` into `target` the way a partial-document update does.
fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let nested = value.is_object() && target.get(key).is_some_and(Value::is_object);
                if !nested {
                    target.insert(key.clone(), value.clone());
                } else if let Some(existing) = target.get_mut(key) {
                    merge_into(existing, value);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

fn run_script(source: &mut Value, script: &UpdateScript) -> Applied {
    if !source.is_object() {
        *source = Value::Object(Map::new());
    }
    let Some(fields) = source.as_object_mut() else {
        return Applied::Unchanged;
    };
    match script {
        UpdateScript::ResetJobs => {
            fields.insert("jobs".into(), json!({}));
            Applied::Changed
        }
        UpdateScript::AppendUnique { field, value } => {
            let list = fields.entry(field.clone()).or_insert_with(|| json!([]));
            if !list.is_array() {
                *list = json!([]);
            }
            let Some(items) = list.as_array_mut() else {
                return Applied::Unchanged;
            };
            if items.iter().any(|v| v.as_str() == Some(value.as_str())) {
                Applied::Unchanged
            } else {
                items.push(Value::String(value.clone()));
                Applied::Changed
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn locate(&self, index: &str, ids: &[DocumentId]) -> Result<HashMap<DocumentId, String>, IndexerError> {
        let indices = self.indices.lock().unwrap();
        let mut found = HashMap::new();
        for name in self.resolve(&indices, index) {
            let Some(docs) = indices.get(&name) else { continue };
            for id in ids {
                if docs.contains_key(id.as_str()) {
                    found.entry(id.clone()).or_insert_with(|| name.clone());
                }
            }
        }
        Ok(found)
    }

    async fn bulk(&self, mutations: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
        *self.bulk_calls.lock().unwrap() += 1;
        let mut indices = self.indices.lock().unwrap();
        let mut outcome = BulkOutcome::default();
        for mutation in mutations {
            match Self::apply(&mut indices, mutation) {
                Ok(Applied::Changed) => outcome.applied += 1,
                Ok(Applied::Unchanged) => outcome.noops += 1,
                Err(reason) => outcome.failures.push(BulkFailure {
                    target: mutation.target.clone(),
                    reason,
                }),
            }
        }
        Ok(outcome)
    }

    async fn set_field_where(
        &self,
        index: &str,
        filter: &[(&str, &str)],
        field: &str,
        value: Value,
    ) -> Result<u64, IndexerError> {
        let mut indices = self.indices.lock().unwrap();
        let mut updated = 0;
        for name in self.resolve(&indices, index) {
            let Some(docs) = indices.get_mut(&name) else { continue };
            for doc in docs.values_mut() {
                let matches = filter
                    .iter()
                    .all(|(k, v)| doc.get(*k).and_then(Value::as_str) == Some(*v));
                if let (true, Some(fields)) = (matches, doc.as_object_mut()) {
                    fields.insert(field.to_string(), value.clone());
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn load(&self, index: &str, id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        self.get(index, id)
            .map(|doc| {
                serde_json::from_value(doc)
                    .map_err(|e| IndexerError::StoreRead(format!("checkpoint {index}/{id}: {e}")))
            })
            .transpose()
    }

    async fn save(&self, index: &str, id: &str, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.insert(index, id, json!({ "block_num": checkpoint.block_num }));
        Ok(())
    }
}
