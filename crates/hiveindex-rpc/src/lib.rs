//! hiveindex-rpc — JSON-RPC transport for Hive API nodes.
//!
//! Provides:
//! - JSON-RPC 2.0 wire types ([`JsonRpcRequest`], [`JsonRpcResponse`])
//! - The [`RpcTransport`] trait and a `reqwest`-backed [`HttpRpcClient`]
//!   with true HTTP batching
//! - [`EndpointPool`], the shrinking candidate set used for failover

pub mod error;
pub mod http;
pub mod pool;
pub mod request;
pub mod transport;

pub use error::TransportError;
pub use http::{HttpClientConfig, HttpRpcClient};
pub use pool::EndpointPool;
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{call, RpcTransport};

/// Public Hive API nodes used when no endpoint list is configured.
pub const DEFAULT_HIVE_NODES: &[&str] = &[
    "https://api.hive.blog",
    "https://api.deathwing.me",
    "https://hive-api.arcange.eu",
    "https://hived.emre.sh",
    "https://api.openhive.network",
];
