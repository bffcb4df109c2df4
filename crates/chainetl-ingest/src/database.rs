//! Storage-side contracts of the loader
//!
//! A [`Database`] hands out [`DbTx`] values; the pipeline fills one per
//! submitted block range and commits it once the range is fully transformed.

use async_trait::async_trait;
use chainetl_common::Result;

use crate::types::Entity;

/// Buffered writes for one block range
#[async_trait]
pub trait DbTx: Send {
    /// Buffer an entity. Never blocks and never fails.
    fn add_entity(&mut self, entity: Entity);

    /// Flush everything buffered so far.
    ///
    /// On error, writes that already landed are not rolled back.
    async fn commit(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Database: Send + Sync {
    type Tx: DbTx + 'static;

    fn new_tx(&self) -> Result<Self::Tx>;

    /// Height of the last block stored, 0 when nothing is stored yet.
    async fn last_block_number(&self) -> Result<i64>;

    async fn close(&self) -> Result<()>;
}
