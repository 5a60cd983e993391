//! OpenSearch backend over plain HTTP.
//!
//! Uses the REST endpoints directly: `_bulk` for cycle commits, `_search`
//! with an `ids` query for existence checks, `_doc`/`_update` for the
//! checkpoint record and `_update_by_query` for flag updates. Each request
//! goes to a randomly chosen node of the configured cluster.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use hiveindex_core::checkpoint::{Checkpoint, CheckpointStore};
use hiveindex_core::error::IndexerError;
use hiveindex_core::identity::DocumentId;
use hiveindex_core::mutation::{DocumentMutation, DocumentTarget};
use hiveindex_core::store::{BulkFailure, BulkOutcome, DocumentStore};

/// Connection settings for an OpenSearch cluster.
#[derive(Debug, Clone)]
pub struct OpenSearchConfig {
    /// Node base URLs, e.g. `https://os1.example.com:9200`.
    pub nodes: Vec<String>,
    /// Basic auth credentials.
    pub auth: Option<(String, String)>,
    pub request_timeout: Duration,
}

impl OpenSearchConfig {
    pub fn new(nodes: Vec<String>) -> Self {
        Self {
            nodes,
            auth: None,
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Parse `user:pass` credentials.
    pub fn with_auth(mut self, credentials: &str) -> Result<Self, IndexerError> {
        let (user, pass) = credentials
            .split_once(':')
            .ok_or_else(|| IndexerError::Config("OpenSearch auth must be `user:pass`".into()))?;
        self.auth = Some((user.to_string(), pass.to_string()));
        Ok(self)
    }
}

/// OpenSearch-backed document and checkpoint store.
pub struct OpenSearchStore {
    http: reqwest::Client,
    config: OpenSearchConfig,
}

impl OpenSearchStore {
    pub fn new(config: OpenSearchConfig) -> Result<Self, IndexerError> {
        if config.nodes.is_empty() {
            return Err(IndexerError::Config("no OpenSearch nodes configured".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IndexerError::Config(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }

    fn node(&self) -> &str {
        self.config
            .nodes
            .choose(&mut rand::thread_rng())
            .map(|n| n.trim_end_matches('/'))
            .unwrap_or_default()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.node(), path.trim_start_matches('/'));
        let req = self.http.request(method, url);
        match &self.config.auth {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    /// Send `req` and parse a JSON body; non-2xx responses become `err`.
    async fn send_json(
        req: reqwest::RequestBuilder,
        err: fn(String) -> IndexerError,
    ) -> Result<(reqwest::StatusCode, Value), IndexerError> {
        let resp = req.send().await.map_err(|e| err(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| err(e.to_string()))?;
        let value = serde_json::from_str(&body).unwrap_or(Value::Null);
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(err(format!("HTTP {}: {}", status.as_u16(), truncate(&body, 512))));
        }
        Ok((status, value))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// Largest result window a single `_search` may request.
const MAX_SEARCH_SIZE: usize = 10_000;

/// `_search` bodies for an existence check, each covering at most
/// [`MAX_SEARCH_SIZE`] ids.
fn locate_queries(ids: &[DocumentId]) -> Vec<Value> {
    ids.chunks(MAX_SEARCH_SIZE)
        .map(|chunk| {
            json!({
                "query": { "ids": { "values": chunk } },
                "size": chunk.len(),
                "_source": false,
            })
        })
        .collect()
}

/// NDJSON body for `_bulk`: an action line and a body line per mutation.
pub fn bulk_body(mutations: &[DocumentMutation]) -> String {
    let mut out = String::new();
    for m in mutations {
        out.push_str(&m.action_line().to_string());
        out.push('\n');
        out.push_str(&m.body_line().to_string());
        out.push('\n');
    }
    out
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_index", default)]
    index: String,
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

/// Fold a `_bulk` response into a [`BulkOutcome`].
pub fn parse_bulk_response(body: Value) -> Result<BulkOutcome, IndexerError> {
    let resp: BulkResponse =
        serde_json::from_value(body).map_err(|e| IndexerError::StoreWrite(format!("unreadable bulk response: {e}")))?;

    let mut outcome = BulkOutcome::default();
    for item in resp.items.into_iter().flat_map(HashMap::into_values) {
        match (item.error, item.result.as_deref()) {
            (Some(error), _) => outcome.failures.push(BulkFailure {
                target: DocumentTarget::new(item.index, item.id),
                reason: error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            }),
            (None, Some("noop")) => outcome.noops += 1,
            (None, _) => outcome.applied += 1,
        }
    }
    if resp.errors && outcome.failures.is_empty() {
        outcome.failures.push(BulkFailure {
            target: DocumentTarget::new("", ""),
            reason: "bulk reported errors without item details".into(),
        });
    }
    Ok(outcome)
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn locate(&self, index: &str, ids: &[DocumentId]) -> Result<HashMap<DocumentId, String>, IndexerError> {
        let mut found = HashMap::new();
        for body in locate_queries(ids) {
            let req = self
                .request(reqwest::Method::POST, &format!("{index}/_search"))
                .json(&body);
            let (status, value) = Self::send_json(req, IndexerError::StoreRead).await?;
            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::warn!(index, "search target does not exist; treating every id as missing");
                return Ok(HashMap::new());
            }

            let hits = value["hits"]["hits"].as_array().cloned().unwrap_or_default();
            found.extend(hits.iter().filter_map(|hit| {
                let id = hit["_id"].as_str()?;
                let index = hit["_index"].as_str()?;
                Some((DocumentId::from_raw(id), index.to_string()))
            }));
        }
        Ok(found)
    }

    async fn bulk(&self, mutations: &[DocumentMutation]) -> Result<BulkOutcome, IndexerError> {
        if mutations.is_empty() {
            return Ok(BulkOutcome::default());
        }
        let req = self
            .request(reqwest::Method::POST, "_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(bulk_body(mutations));
        let (status, value) = Self::send_json(req, IndexerError::StoreWrite).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexerError::StoreWrite("bulk endpoint returned 404".into()));
        }
        parse_bulk_response(value)
    }

    async fn set_field_where(
        &self,
        index: &str,
        filter: &[(&str, &str)],
        field: &str,
        value: Value,
    ) -> Result<u64, IndexerError> {
        let must: Vec<Value> = filter
            .iter()
            .map(|(k, v)| {
                let mut term = Map::new();
                term.insert(k.to_string(), json!(v));
                json!({ "term": term })
            })
            .collect();
        let body = json!({
            "query": { "bool": { "must": must } },
            "script": {
                "source": "ctx._source[params.field] = params.value",
                "lang": "painless",
                "params": { "field": field, "value": value },
            },
        });
        let req = self
            .request(reqwest::Method::POST, &format!("{index}/_update_by_query?conflicts=proceed"))
            .json(&body);
        let (_, resp) = Self::send_json(req, IndexerError::StoreWrite).await?;
        Ok(resp["updated"].as_u64().unwrap_or(0))
    }

    fn name(&self) -> &str {
        "opensearch"
    }
}

#[async_trait]
impl CheckpointStore for OpenSearchStore {
    async fn load(&self, index: &str, id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let req = self.request(reqwest::Method::GET, &format!("{index}/_doc/{id}"));
        let (status, value) = Self::send_json(req, IndexerError::StoreRead).await?;
        if status == reqwest::StatusCode::NOT_FOUND || value["found"] == json!(false) {
            return Ok(None);
        }
        serde_json::from_value(value["_source"].clone())
            .map(Some)
            .map_err(|e| IndexerError::StoreRead(format!("checkpoint {index}/{id}: {e}")))
    }

    async fn save(&self, index: &str, id: &str, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let body = json!({ "doc": checkpoint, "upsert": checkpoint });
        let req = self
            .request(reqwest::Method::POST, &format!("{index}/_update/{id}"))
            .json(&body);
        let (status, _) = Self::send_json(req, IndexerError::StoreWrite).await?;
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IndexerError::StoreWrite(format!("checkpoint index {index} not found")));
        }
        Ok(())
    }
}
