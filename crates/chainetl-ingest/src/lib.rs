//! chainetl ingest library
//!
//! Loads ranges of blocks from a ledger node into Neo4j bulk-import CSV files.
//!
//! # Architecture
//!
//! - **source**: [`source::NodeSource`] and its JSON-RPC implementation
//! - **pipeline**: three concurrent stages (range to hashes, hashes to blocks,
//!   blocks into a unit of work) joined by bounded channels
//! - **graph**: decomposes blocks and transactions into node and relationship rows
//! - **store**: worker-pool CSV store with cursor-cached sequential reads
//!
//! # Example
//!
//! ```no_run
//! use chainetl_ingest::database::Database;
//! use chainetl_ingest::graph::GraphDatabase;
//! use chainetl_ingest::pipeline::LoaderManager;
//! use chainetl_ingest::source::RpcSource;
//! use chainetl_ingest::types::BlockRange;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = RpcSource::new("http://localhost:18443", None, None, Duration::from_secs(60))?;
//!     let db = GraphDatabase::open("./data")?;
//!     let loader = LoaderManager::new(Arc::new(source), 1)?;
//!
//!     let stats = loader
//!         .submit(BlockRange::new(0, 999), Box::new(db.new_tx()?))
//!         .await?;
//!     stats.wait().await?;
//!
//!     loader.close().await?;
//!     db.close().await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod completion;
pub mod config;
pub mod database;
pub mod graph;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod types;

pub use completion::Completion;
pub use config::{IngestConfig, StoreConfig};
pub use database::{Database, DbTx};
pub use pipeline::{LoadStats, LoaderManager};
