//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Batches are sent as one JSON array in a single HTTP call. There is no
//! retry here: a failing node is reported to the caller, which removes it
//! from the [`EndpointPool`](crate::pool::EndpointPool).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::RpcTransport;

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: concat!("hiveindex/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// HTTP JSON-RPC client for one API node.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            TransportError::Http(e.to_string())
        }
    }

    /// POST `body` and return the parsed JSON response body.
    async fn post<B: serde::Serialize + ?Sized>(&self, body: &B) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await.map_err(|e| self.map_err(e))?;
        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(format!("invalid JSON body: {e}")))
    }
}

/// Parse a batch response body: it must be an array of response objects.
pub fn parse_batch(body: Value) -> Result<Vec<JsonRpcResponse>, TransportError> {
    let Value::Array(items) = body else {
        return Err(TransportError::Malformed("batch response is not an array".into()));
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item)
                .map_err(|e| TransportError::Malformed(format!("invalid batch element: {e}")))
        })
        .collect()
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let body = self.post(&req).await?;
        serde_json::from_value(body).map_err(|e| TransportError::Malformed(e.to_string()))
    }

    /// True HTTP batch: send all requests as a JSON array in one HTTP call.
    async fn send_batch(&self, reqs: Vec<JsonRpcRequest>) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let body = self.post(&reqs).await?;
        parse_batch(body)
    }

    fn url(&self) -> &str {
        &self.url
    }
}
