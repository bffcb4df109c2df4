//! Ledger domain types: block ranges, blocks, transactions and the entities
//! handed to a unit of work.

pub mod block;
pub mod transaction;

pub use block::{Block, BlockHash, BlockHeader};
pub use transaction::{ScriptPubKey, Transaction, TxInput, TxOutput};

use chainetl_common::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive range of block heights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub start: i64,
    pub end: i64,
}

impl BlockRange {
    /// Construct without validation; the range stage rejects `start > end`.
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start < 0 {
            return Err(EtlError::Validation(format!(
                "block range start ({}) must not be negative",
                self.start
            )));
        }
        if self.start > self.end {
            return Err(EtlError::Validation(format!(
                "block range start ({}) must be less than or equal to end ({})",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Number of blocks covered, zero for an inverted range
    pub fn len(&self) -> u64 {
        if self.start > self.end {
            0
        } else {
            self.end.abs_diff(self.start).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into consecutive ranges of at most `size` blocks (minimum 1).
    pub fn batches(self, size: i64) -> impl Iterator<Item = BlockRange> {
        let step = size.max(1) - 1;
        let batch_from =
            move |start: i64| BlockRange::new(start, start.saturating_add(step).min(self.end));
        let first = (!self.is_empty()).then(|| batch_from(self.start));
        std::iter::successors(first, move |prev| {
            (prev.end < self.end).then(|| batch_from(prev.end + 1))
        })
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blocks {} - {}", self.start, self.end)
    }
}

/// Kinds of entity a unit of work counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    BlockHeader,
    Transaction,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::BlockHeader => f.write_str("block_header"),
            EntityKind::Transaction => f.write_str("transaction"),
        }
    }
}

/// One ledger entity added to a unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    BlockHeader(BlockHeader),
    Transaction(Transaction),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::BlockHeader(_) => EntityKind::BlockHeader,
            Entity::Transaction(_) => EntityKind::Transaction,
        }
    }
}
