//! chainetl-ingest - load a block range from a node into Neo4j import CSVs

use anyhow::{Context, Result};
use chainetl_common::logging::{init_logging, LogConfig, LogLevel};
use chainetl_ingest::database::Database;
use chainetl_ingest::graph::GraphDatabase;
use chainetl_ingest::pipeline::{LoadStats, LoaderManager};
use chainetl_ingest::source::{NodeSource, RpcSource};
use chainetl_ingest::types::BlockRange;
use chainetl_ingest::IngestConfig;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "chainetl-ingest")]
#[command(author, version, about = "Load ledger blocks into Neo4j bulk-import CSV files")]
struct Cli {
    /// First block height to load
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Last block height to load (default: current chain tip)
    #[arg(long)]
    end: Option<i64>,

    /// Continue after the last block already in the data directory
    #[arg(long)]
    resume: bool,

    /// Blocks per submitted range
    #[arg(long)]
    batch_size: Option<i64>,

    /// JSON-RPC endpoint of the node
    #[arg(long)]
    rpc_url: Option<String>,

    #[arg(long)]
    rpc_user: Option<String>,

    #[arg(long)]
    rpc_password: Option<String>,

    /// Directory for the CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Number of store workers
    #[arg(long)]
    store_workers: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, mut config: IngestConfig) -> Result<IngestConfig> {
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(user) = &self.rpc_user {
            config.rpc_user = Some(user.clone());
        }
        if let Some(password) = &self.rpc_password {
            config.rpc_password = Some(password.clone());
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(workers) = self.store_workers {
            config.store_workers = workers;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("chainetl-ingest")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.apply(IngestConfig::from_env().context("Failed to load configuration")?)?;
    let source = Arc::new(RpcSource::from_config(&config)?);
    info!(
        rpc_url = %source.url(),
        data_dir = %config.data_dir.display(),
        batch_size = config.batch_size,
        "Starting ingestion"
    );
    let end = match cli.end {
        Some(end) => end,
        None => source
            .block_count()
            .await
            .context("Failed to query chain height")?,
    };

    let db = GraphDatabase::new(&config.store_config()).context("Failed to open data directory")?;
    let start = if cli.resume {
        match db.last_block().await? {
            Some(last) => last + 1,
            None => cli.start,
        }
    } else {
        cli.start
    };

    let outcome = run(&db, source, &config, BlockRange::new(start, end)).await;
    let closed = db.close().await.context("Failed to close data files");
    outcome?;
    closed?;

    info!("Ingestion complete");
    Ok(())
}

/// Submit `range` in batches and wait for every batch to commit.
async fn run(
    db: &GraphDatabase,
    source: Arc<RpcSource>,
    config: &IngestConfig,
    range: BlockRange,
) -> Result<()> {
    if range.is_empty() {
        info!(%range, "Nothing to load");
        return Ok(());
    }

    let loader = LoaderManager::new(source, config.pipeline_capacity)?;

    let cancel = loader.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping pipeline");
            cancel.cancel();
        }
    });

    let (report_tx, report_rx) = mpsc::channel(16);
    let reporter = tokio::spawn(report(report_rx));

    let mut submit_error = None;
    for batch in range.batches(config.batch_size) {
        let submitted = match db.new_tx() {
            Ok(tx) => loader.submit(batch, Box::new(tx)).await,
            Err(err) => Err(err),
        };
        match submitted {
            Ok(stats) => {
                if report_tx.send(stats).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                submit_error = Some(err);
                break;
            }
        }
    }
    drop(report_tx);

    let closed = loader.close().await;
    let failures = reporter.await.context("Reporter task failed")?;

    closed.context("Loader pipeline failed")?;
    if let Some(err) = submit_error {
        return Err(err).context("Failed to submit block range");
    }
    if failures > 0 {
        anyhow::bail!("{failures} block ranges failed to load");
    }
    Ok(())
}

/// Log each batch's outcome in submission order; returns the number of failures.
async fn report(mut stats: mpsc::Receiver<LoadStats>) -> usize {
    let mut failures = 0;
    while let Some(batch) = stats.recv().await {
        match batch.wait().await {
            Ok(()) => info!(
                range = %batch.block_range(),
                blocks = batch.num_blocks(),
                transactions = batch.num_transactions(),
                "{batch}"
            ),
            Err(err) if err.is_shutdown() => {
                failures += 1;
                warn!(range = %batch.block_range(), error = %err, "Block range abandoned");
            }
            Err(err) => {
                failures += 1;
                error!(range = %batch.block_range(), error = %err, "Block range failed");
            }
        }
    }
    failures
}
