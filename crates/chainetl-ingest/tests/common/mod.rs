//! Shared fixtures for chainetl-ingest integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chainetl_common::{EtlError, Result};
use chainetl_ingest::database::DbTx;
use chainetl_ingest::source::NodeSource;
use chainetl_ingest::types::{
    Block, BlockHash, BlockHeader, Entity, ScriptPubKey, Transaction, TxInput, TxOutput,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Block Fixtures
// ============================================================================

pub fn block_hash(height: i64) -> BlockHash {
    BlockHash::new(format!("block{height}"))
}

fn output(n: u32, value: f64, address: &str) -> TxOutput {
    TxOutput {
        value,
        n,
        script_pubkey: ScriptPubKey {
            script_type: "pubkeyhash".into(),
            address: Some(address.into()),
            addresses: Vec::new(),
        },
    }
}

fn coinbase_tx(height: i64) -> Transaction {
    Transaction {
        txid: format!("cb{height}"),
        hash: format!("cb{height}"),
        size: 120,
        time: 0,
        lock_time: 0,
        block_hash: BlockHash::default(),
        vin: vec![TxInput {
            coinbase: Some(format!("{height:08x}")),
            txid: None,
            vout: None,
            sequence: u32::MAX,
        }],
        vout: vec![output(0, 50.0, &format!("miner{height}"))],
    }
}

fn transfer_tx(height: i64, index: i64) -> Transaction {
    Transaction {
        txid: format!("tx{height}_{index}"),
        hash: format!("tx{height}_{index}"),
        size: 250,
        time: 0,
        lock_time: 0,
        block_hash: BlockHash::default(),
        vin: vec![TxInput {
            coinbase: None,
            txid: Some(format!("cb{}", height - 1)),
            vout: Some(0),
            sequence: u32::MAX,
        }],
        vout: vec![
            output(0, 1.0, &format!("user{index}")),
            output(1, 48.9, &format!("miner{}", height - 1)),
        ],
    }
}

/// Block `height` holds a coinbase followed by `height` transfers.
pub fn block(height: i64) -> Block {
    let header = BlockHeader {
        hash: block_hash(height),
        height,
        time: 1_231_006_505 + height * 600,
        size: 285,
        difficulty: 1.0,
        nonce: height as u32,
        version: 1,
        merkle_root: format!("merkle{height}"),
        previous_hash: (height > 0).then(|| block_hash(height - 1)),
    };
    let mut transactions = vec![coinbase_tx(height)];
    transactions.extend((0..height).map(|index| transfer_tx(height, index)));
    Block::new(header, transactions)
}

pub fn transactions_in(start: i64, end: i64) -> u64 {
    (start..=end).map(|height| height as u64 + 1).sum()
}

// ============================================================================
// Mock Node Source
// ============================================================================

/// In-memory chain of `len` blocks
pub struct MockSource {
    blocks: Vec<Block>,
    calls: AtomicUsize,
}

impl MockSource {
    pub fn new(len: i64) -> Self {
        Self {
            blocks: (0..len).map(block).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeSource for MockSource {
    async fn block_hashes_by_range(&self, min: i64, max: i64) -> Result<Vec<BlockHash>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if min > max {
            return Err(EtlError::Validation(format!("{min} > {max}")));
        }
        if min < 0 || max >= self.blocks.len() as i64 {
            return Err(EtlError::Source(format!(
                "Block height out of range: {min} - {max}"
            )));
        }
        Ok((min..=max).map(block_hash).collect())
    }

    async fn blocks(&self, hashes: &[BlockHash]) -> Result<Vec<Block>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        hashes
            .iter()
            .map(|hash| {
                self.blocks
                    .iter()
                    .find(|block| block.hash() == hash)
                    .cloned()
                    .ok_or_else(|| EtlError::Source(format!("Block not found: {hash}")))
            })
            .collect()
    }

    async fn block_count(&self) -> Result<i64> {
        Ok(self.blocks.len() as i64 - 1)
    }
}

// ============================================================================
// Mock Database Transaction
// ============================================================================

/// Records every entity and commit; optionally fails on commit.
#[derive(Clone, Default)]
pub struct MockDbTx {
    pub entities: Arc<Mutex<Vec<Entity>>>,
    pub commits: Arc<AtomicUsize>,
    pub fail_commit: bool,
}

impl MockDbTx {
    pub fn failing() -> Self {
        Self {
            fail_commit: true,
            ..Default::default()
        }
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entities.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DbTx for MockDbTx {
    fn add_entity(&mut self, entity: Entity) {
        if let Ok(mut entities) = self.entities.lock() {
            entities.push(entity);
        }
    }

    async fn commit(&mut self) -> Result<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        if self.fail_commit {
            return Err(EtlError::UnknownFile("mock".into()));
        }
        Ok(())
    }
}
