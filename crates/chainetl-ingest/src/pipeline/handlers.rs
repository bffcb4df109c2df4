//! The three steps of the block loader: range to hashes, hashes to blocks,
//! blocks into the unit of work.

use async_trait::async_trait;
use chainetl_common::{EtlError, Result};
use std::sync::Arc;

use super::stage::{SinkHandler, Transform};
use super::unit_of_work::UnitOfWork;
use crate::source::NodeSource;
use crate::types::{Block, BlockHash, BlockRange, Entity};

pub struct BlockRangeHandler {
    source: Arc<dyn NodeSource>,
}

impl BlockRangeHandler {
    pub fn new(source: Arc<dyn NodeSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Transform<BlockRange, Vec<BlockHash>> for BlockRangeHandler {
    async fn transform(&self, range: BlockRange) -> Result<Vec<BlockHash>> {
        range.validate()?;
        let hashes = self
            .source
            .block_hashes_by_range(range.start, range.end)
            .await?;
        if hashes.len() as u64 != range.len() {
            return Err(EtlError::Source(format!(
                "{range}: node returned {} hashes",
                hashes.len()
            )));
        }
        Ok(hashes)
    }
}

pub struct BlockHashHandler {
    source: Arc<dyn NodeSource>,
}

impl BlockHashHandler {
    pub fn new(source: Arc<dyn NodeSource>) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Transform<Vec<BlockHash>, Vec<Block>> for BlockHashHandler {
    async fn transform(&self, hashes: Vec<BlockHash>) -> Result<Vec<Block>> {
        self.source.blocks(&hashes).await
    }
}

/// Adds each block header followed by its transactions, in block order.
pub struct BlockSink;

#[async_trait]
impl SinkHandler<Vec<Block>> for BlockSink {
    async fn consume(&self, unit_of_work: &mut UnitOfWork, blocks: Vec<Block>) -> Result<()> {
        for block in blocks {
            let (header, transactions) = block.into_parts();
            unit_of_work.add_entity(Entity::BlockHeader(header));
            for tx in transactions {
                unit_of_work.add_entity(Entity::Transaction(tx));
            }
        }
        Ok(())
    }
}
