//! Store and ingestion configuration
//!
//! [`StoreConfig`] is a plain value handed to [`crate::store::CsvStore::new`].
//! [`IngestConfig`] is read from `CHAINETL_*` environment variables (after
//! loading a `.env` file) and can be overridden field by field from the CLI.

use anyhow::Context;
use chainetl_common::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::graph::RecordKind;

/// Default bound of the store's shared message queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default bound of each pipeline link
pub const DEFAULT_PIPELINE_CAPACITY: usize = 1;

/// Default number of blocks per submitted range
pub const DEFAULT_BATCH_SIZE: i64 = 10_000;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Files and worker pool of a [`crate::store::CsvStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Logical file key to backing path
    pub files: BTreeMap<String, PathBuf>,
    /// Number of store workers (default: available parallelism)
    pub workers: usize,
    /// Bound of the shared message queue
    pub queue_capacity: usize,
}

impl StoreConfig {
    pub fn new(files: BTreeMap<String, PathBuf>) -> Self {
        Self {
            files,
            workers: default_workers(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// One `<dir>/<key>.csv` file per key.
    pub fn in_dir<'a>(dir: impl AsRef<Path>, keys: impl IntoIterator<Item = &'a str>) -> Self {
        let dir = dir.as_ref();
        let files = keys
            .into_iter()
            .map(|key| (key.to_string(), dir.join(format!("{key}.csv"))))
            .collect();
        Self::new(files)
    }

    /// The ten graph files under `dir`.
    pub fn graph(dir: impl AsRef<Path>) -> Self {
        Self::in_dir(dir, RecordKind::ALL.iter().map(|kind| kind.file_key()))
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(EtlError::Validation(
                "store needs at least one file".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(EtlError::Validation(
                "store workers must be greater than 0".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(EtlError::Validation(
                "store queue capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// JSON-RPC endpoint of the node
    pub rpc_url: String,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
    /// RPC request timeout in seconds
    pub rpc_timeout_secs: u64,
    /// Directory holding the graph CSV files
    pub data_dir: PathBuf,
    pub store_workers: usize,
    /// Bound of each pipeline link
    pub pipeline_capacity: usize,
    /// Blocks per submitted range
    pub batch_size: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:18443".to_string(),
            rpc_user: None,
            rpc_password: None,
            rpc_timeout_secs: 60,
            data_dir: PathBuf::from("./data"),
            store_workers: default_workers(),
            pipeline_capacity: DEFAULT_PIPELINE_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl IngestConfig {
    /// Load configuration from the environment, reading `.env` first if present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            rpc_url: lookup("CHAINETL_RPC_URL").unwrap_or(defaults.rpc_url),
            rpc_user: lookup("CHAINETL_RPC_USER").or(defaults.rpc_user),
            rpc_password: lookup("CHAINETL_RPC_PASSWORD").or(defaults.rpc_password),
            rpc_timeout_secs: parse_var(&lookup, "CHAINETL_RPC_TIMEOUT_SECS")?
                .unwrap_or(defaults.rpc_timeout_secs),
            data_dir: lookup("CHAINETL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            store_workers: parse_var(&lookup, "CHAINETL_STORE_WORKERS")?
                .unwrap_or(defaults.store_workers),
            pipeline_capacity: parse_var(&lookup, "CHAINETL_PIPELINE_CAPACITY")?
                .unwrap_or(defaults.pipeline_capacity),
            batch_size: parse_var(&lookup, "CHAINETL_BATCH_SIZE")?
                .unwrap_or(defaults.batch_size),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.is_empty() {
            anyhow::bail!("CHAINETL_RPC_URL must not be empty");
        }
        if self.store_workers == 0 {
            anyhow::bail!("CHAINETL_STORE_WORKERS must be greater than 0");
        }
        if self.pipeline_capacity == 0 {
            anyhow::bail!("CHAINETL_PIPELINE_CAPACITY must be greater than 0");
        }
        if self.batch_size <= 0 {
            anyhow::bail!("CHAINETL_BATCH_SIZE must be greater than 0");
        }
        if self.rpc_timeout_secs == 0 {
            anyhow::bail!("CHAINETL_RPC_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Store layout for the graph files under `data_dir`.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::graph(&self.data_dir).with_workers(self.store_workers)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for {key}: {value:?}"))
        })
        .transpose()
}
