//! Ledger node data sources

pub mod rpc;

pub use rpc::RpcSource;

use async_trait::async_trait;
use chainetl_common::Result;

use crate::types::{Block, BlockHash};

/// Read access to a ledger node
#[async_trait]
pub trait NodeSource: Send + Sync {
    /// Hashes of blocks `min..=max`, ascending by height.
    ///
    /// Fails if `min > max` or the range reaches past the chain tip.
    async fn block_hashes_by_range(&self, min: i64, max: i64) -> Result<Vec<BlockHash>>;

    /// Full blocks for `hashes`, in the same order. Fails if any hash is unknown.
    async fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>>;

    /// Height of the chain tip.
    async fn block_count(&self) -> Result<i64>;
}
