//! hiveindex — streams Hive operations into OpenSearch.
//!
//! Usage:
//! ```bash
//! OPENSEARCH_NODES='["https://os1:9200"]' OPENSEARCH_AUTH=admin:secret \
//!     hiveindex --start-block 80000000 --max-blocks-to-fetch 30
//! hiveindex --dry-run --start-block 80000000 --stop-block 80000300
//! ```
//!
//! Exits 0 when the stop block is reached and 1 on any fatal error; the
//! supervisor restarts it from the stored checkpoint.

mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use hiveindex_core::checkpoint::CheckpointStore;
use hiveindex_core::indexer::IndexerConfig;
use hiveindex_core::store::DocumentStore;
use hiveindex_rpc::{EndpointPool, HttpClientConfig, HttpRpcClient, RpcTransport, DEFAULT_HIVE_NODES};
use hiveindex_storage::{InMemoryStore, OpenSearchConfig, OpenSearchStore};
use hiveindex_stream::{Heartbeat, IndexerBuilder, IngestionLoop, LoopExit, MuteSync, RpcContentSource};

use logging::{init_tracing, LogConfig};

#[derive(Parser, Debug)]
#[command(
    name = "hiveindex",
    about = "Hive chain listener — indexes posts, votes and profiles into OpenSearch",
    version
)]
struct Cli {
    /// First block to fetch; resumes from the stored checkpoint when omitted
    #[arg(long = "start-block", alias = "start_block_number")]
    start_block: Option<u64>,

    /// Exit cleanly once this block is reached
    #[arg(long = "stop-block", alias = "stop_block_number")]
    stop_block: Option<u64>,

    /// Blocks requested per cycle
    #[arg(long = "max-blocks-to-fetch", alias = "max_blocks_to_fetch", default_value_t = 30)]
    max_blocks_to_fetch: u64,

    /// Do not persist the checkpoint (cursor lives in memory only)
    #[arg(long = "disable-update-settings", alias = "disable_update_settings")]
    disable_update_settings: bool,

    /// Id of the checkpoint document in the settings index
    #[arg(long = "block-number-db-id", alias = "block_number_db_id", default_value = "chain-sync-block-number")]
    block_number_db_id: String,

    /// Hive API nodes (comma separated)
    #[arg(long = "hive-nodes", env = "HIVE_NODES", value_delimiter = ',')]
    hive_nodes: Vec<String>,

    /// OpenSearch nodes as a JSON array of URLs
    #[arg(long = "opensearch-nodes", env = "OPENSEARCH_NODES")]
    opensearch_nodes: Option<String>,

    /// OpenSearch basic auth, `user:pass`
    #[arg(long = "opensearch-auth", env = "OPENSEARCH_AUTH", hide_env_values = true)]
    opensearch_auth: Option<String>,

    /// Heartbeat URL; the cycle time in milliseconds (whole seconds) is appended
    #[arg(long = "heartbeat-url", env = "CHAIN_LISTENER_HEARBEAT_URL")]
    heartbeat_url: Option<String>,

    /// Run the periodic community mute sync
    #[arg(long = "mute-sync")]
    mute_sync: bool,

    /// Use an in-memory store instead of OpenSearch
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Log level directive (overridden by RUST_LOG)
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long = "log-json")]
    log_json: bool,
}

impl Cli {
    fn indexer_config(&self) -> IndexerConfig {
        let mut builder = IndexerBuilder::new()
            .window_size(self.max_blocks_to_fetch)
            .checkpoint("settings", self.block_number_db_id.clone())
            .persist_checkpoint(!self.disable_update_settings);
        if let Some(start) = self.start_block {
            builder = builder.start_block(start);
        }
        if let Some(stop) = self.stop_block {
            builder = builder.stop_block(stop);
        }
        builder.build_config()
    }

    fn node_urls(&self) -> Vec<String> {
        let urls: Vec<String> = self
            .hive_nodes
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if urls.is_empty() {
            DEFAULT_HIVE_NODES.iter().map(|u| u.to_string()).collect()
        } else {
            urls
        }
    }
}

/// Both store roles served by one backend.
struct Stores {
    documents: Arc<dyn DocumentStore>,
    checkpoints: Arc<dyn CheckpointStore>,
}

fn build_stores(cli: &Cli, config: &IndexerConfig) -> Result<Stores> {
    if cli.dry_run {
        tracing::warn!("dry run: writing to an in-memory store");
        let store = Arc::new(
            InMemoryStore::new().with_alias(config.indices.content_alias.clone(), config.indices.content_prefix.clone()),
        );
        return Ok(Stores {
            documents: store.clone(),
            checkpoints: store,
        });
    }

    let raw = cli
        .opensearch_nodes
        .as_deref()
        .context("OPENSEARCH_NODES is not set (use --dry-run to run without a store)")?;
    let nodes: Vec<String> = serde_json::from_str(raw).context("OPENSEARCH_NODES must be a JSON array of URLs")?;

    let mut os_config = OpenSearchConfig::new(nodes);
    if let Some(auth) = &cli.opensearch_auth {
        os_config = os_config.with_auth(auth)?;
    }
    let store = Arc::new(OpenSearchStore::new(os_config)?);
    Ok(Stores {
        documents: store.clone(),
        checkpoints: store,
    })
}

async fn run(cli: Cli) -> Result<LoopExit> {
    let config = cli.indexer_config();
    let urls = cli.node_urls();
    if config.window_size == 0 {
        bail!("--max-blocks-to-fetch must be at least 1");
    }

    let transports = urls
        .iter()
        .map(|url| HttpRpcClient::new(url.clone(), HttpClientConfig::default()).map(|c| Arc::new(c) as Arc<dyn RpcTransport>))
        .collect::<Result<Vec<_>, _>>()?;
    let stores = build_stores(&cli, &config)?;

    if cli.mute_sync {
        MuteSync::new(
            transports[0].clone(),
            stores.documents.clone(),
            config.community.community.clone(),
            config.indices.content_alias.clone(),
        )
        .spawn();
    }

    let content = Arc::new(RpcContentSource::new(transports.clone()));
    let mut ingestion = IngestionLoop::start(
        config,
        EndpointPool::new(transports),
        stores.documents,
        stores.checkpoints,
        content,
    )
    .await?;
    if let Some(url) = &cli.heartbeat_url {
        ingestion = ingestion.with_heartbeat(Heartbeat::new(url.clone()));
    }

    tracing::info!(nodes = ?urls, dry_run = cli.dry_run, "hiveindex starting");
    Ok(ingestion.run().await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.log_json,
    });

    match run(cli).await {
        Ok(LoopExit::StopBlockReached { at }) => {
            tracing::info!(at, "stopped at configured block");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "hiveindex exiting");
            ExitCode::FAILURE
        }
    }
}
