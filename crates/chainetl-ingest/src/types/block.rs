//! Block and block header types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::transaction::Transaction;

/// Blocks between subsidy halvings.
const HALVING_INTERVAL: i64 = 210_000;

/// Subsidy of the genesis epoch, in BTC.
const INITIAL_SUBSIDY: f64 = 50.0;

/// Hex-encoded block hash as reported by the node
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHash(String);

impl BlockHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockHash {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Block header fields carried into the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub hash: BlockHash,
    pub height: i64,
    /// Block time in UNIX epoch seconds
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub difficulty: f64,
    #[serde(default)]
    pub nonce: u32,
    #[serde(default)]
    pub version: i32,
    #[serde(default, rename = "merkleroot")]
    pub merkle_root: String,
    /// Absent for the genesis block
    #[serde(default, rename = "previousblockhash")]
    pub previous_hash: Option<BlockHash>,
}

impl BlockHeader {
    /// Block subsidy in BTC: 50 halved every 210 000 blocks, zero once exhausted.
    pub fn reward(&self) -> f64 {
        if self.height < 0 {
            return 0.0;
        }
        let halvings = self.height / HALVING_INTERVAL;
        if halvings >= 64 {
            0.0
        } else {
            INITIAL_SUBSIDY / (1u64 << halvings) as f64
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

impl fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

/// A block header with its transactions
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawBlock")]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Build a block, stamping the block hash and time onto transactions that lack them.
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        let transactions = transactions
            .into_iter()
            .map(|mut tx| {
                if tx.block_hash.is_empty() {
                    tx.block_hash = header.hash.clone();
                }
                if tx.time == 0 {
                    tx.time = header.time;
                }
                tx
            })
            .collect();
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> &BlockHash {
        &self.header.hash
    }

    pub fn into_parts(self) -> (BlockHeader, Vec<Transaction>) {
        (self.header, self.transactions)
    }
}

/// Shape of `getblock <hash> 2`: header fields with the transactions inline.
#[derive(Deserialize)]
struct RawBlock {
    #[serde(flatten)]
    header: BlockHeader,
    #[serde(default)]
    tx: Vec<Transaction>,
}

impl From<RawBlock> for Block {
    fn from(raw: RawBlock) -> Self {
        Block::new(raw.header, raw.tx)
    }
}
