//! Endpoint pool — the shrinking candidate set used for failover.
//!
//! Endpoints are picked at random. A node that fails is removed for the
//! rest of the process lifetime; once the pool is empty, callers must treat
//! it as fatal. A restart rebuilds the pool from configuration.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::error::TransportError;
use crate::http::{HttpClientConfig, HttpRpcClient};
use crate::transport::RpcTransport;

/// Ordered set of candidate API node transports.
pub struct EndpointPool {
    endpoints: Vec<Arc<dyn RpcTransport>>,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Arc<dyn RpcTransport>>) -> Self {
        Self { endpoints }
    }

    /// Build an HTTP transport for every URL.
    pub fn from_urls<I, S>(urls: I, config: HttpClientConfig) -> Result<Self, TransportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let endpoints = urls
            .into_iter()
            .map(|url| {
                HttpRpcClient::new(url, config.clone()).map(|c| Arc::new(c) as Arc<dyn RpcTransport>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(endpoints))
    }

    /// Pick a random remaining endpoint.
    pub fn pick(&self) -> Result<Arc<dyn RpcTransport>, TransportError> {
        self.endpoints
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(TransportError::NoEndpoints)
    }

    /// Drop the endpoint identified by `url`. Returns `true` if it was present.
    pub fn remove(&mut self, url: &str) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| e.url() != url);
        before != self.endpoints.len()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// URLs of the remaining endpoints.
    pub fn urls(&self) -> Vec<String> {
        self.endpoints.iter().map(|e| e.url().to_string()).collect()
    }
}
