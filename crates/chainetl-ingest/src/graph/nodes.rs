//! Node rows: blocks, transactions, outputs and addresses

use crate::store::CsvRecord;
use crate::types::{BlockHeader, Transaction, TxOutput};

pub const BLOCK_HEADERS: &[&str] = &[
    "blockID:id",
    "height:int",
    "time:int",
    "size:int",
    "difficulty:double",
    "nonce:int",
];

pub const TRANSACTION_HEADERS: &[&str] = &["txID:id", "size:int", "time:int", "lockTime:int"];

pub const OUTPUT_HEADERS: &[&str] = &["outputID:id", "index:int", "value:double"];

pub const ADDRESS_HEADERS: &[&str] = &["addressID:id"];

/// Id of the synthetic output carrying a block's subsidy.
pub fn coinbase_output_id(block_hash: &str) -> String {
    format!("{block_hash}_coinbase")
}

#[derive(Debug, Clone)]
pub struct BlockNode {
    pub hash: String,
    pub height: i64,
    pub time: i64,
    pub size: i32,
    pub difficulty: f64,
    pub nonce: u32,
}

impl From<&BlockHeader> for BlockNode {
    fn from(header: &BlockHeader) -> Self {
        Self {
            hash: header.hash.to_string(),
            height: header.height,
            time: header.time,
            size: header.size,
            difficulty: header.difficulty,
            nonce: header.nonce,
        }
    }
}

impl CsvRecord for BlockNode {
    fn headers(&self) -> &'static [&'static str] {
        BLOCK_HEADERS
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.hash.clone(),
            self.height.to_string(),
            self.time.to_string(),
            self.size.to_string(),
            self.difficulty.to_string(),
            self.nonce.to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct TransactionNode {
    pub txid: String,
    pub size: i32,
    pub time: i64,
    pub lock_time: u32,
}

impl From<&Transaction> for TransactionNode {
    fn from(tx: &Transaction) -> Self {
        Self {
            txid: tx.txid.clone(),
            size: tx.size,
            time: tx.time,
            lock_time: tx.lock_time,
        }
    }
}

impl CsvRecord for TransactionNode {
    fn headers(&self) -> &'static [&'static str] {
        TRANSACTION_HEADERS
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.txid.clone(),
            self.size.to_string(),
            self.time.to_string(),
            self.lock_time.to_string(),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct OutputNode {
    pub id: String,
    pub index: u32,
    pub value: f64,
}

impl OutputNode {
    pub fn new(tx: &Transaction, output: &TxOutput) -> Self {
        Self {
            id: tx.output_id(output.n),
            index: output.n,
            value: output.value,
        }
    }

    /// The block subsidy as an output of its own.
    pub fn coinbase(header: &BlockHeader) -> Self {
        Self {
            id: coinbase_output_id(header.hash.as_str()),
            index: 0,
            value: header.reward(),
        }
    }
}

impl CsvRecord for OutputNode {
    fn headers(&self) -> &'static [&'static str] {
        OUTPUT_HEADERS
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.index.to_string(), self.value.to_string()]
    }
}

#[derive(Debug, Clone)]
pub struct AddressNode(pub String);

impl CsvRecord for AddressNode {
    fn headers(&self) -> &'static [&'static str] {
        ADDRESS_HEADERS
    }

    fn row(&self) -> Vec<String> {
        vec![self.0.clone()]
    }
}
