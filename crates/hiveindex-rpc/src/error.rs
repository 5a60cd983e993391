//! Transport-level error types.

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to an API node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, TLS, body read, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The node answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body is not the JSON shape the call expects.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Every endpoint in the pool has been removed.
    #[error("No endpoints left in pool")]
    NoEndpoints,

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message() {
        let err = TransportError::Status { status: 503, body: "busy".into() };
        assert_eq!(err.to_string(), "HTTP 503: busy");
    }
}
