//! Relationship rows. Every relationship file shares the `:START_ID,:END_ID` header.

use super::nodes::coinbase_output_id;
use crate::store::CsvRecord;
use crate::types::{BlockHeader, Transaction, TxInput, TxOutput};

pub const RELATIONSHIP_HEADERS: &[&str] = &[":START_ID", ":END_ID"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub start: String,
    pub end: String,
}

impl Relationship {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Block to its parent; `None` for a block without one.
    pub fn chain(header: &BlockHeader) -> Option<Self> {
        if header.is_genesis() {
            return None;
        }
        header
            .previous_hash
            .as_ref()
            .map(|previous| Self::new(header.hash.as_str(), previous.as_str()))
    }

    /// Block to the output holding its subsidy.
    pub fn coinbase(header: &BlockHeader) -> Self {
        Self::new(header.hash.as_str(), coinbase_output_id(header.hash.as_str()))
    }

    /// Transaction to the block containing it.
    pub fn include(tx: &Transaction) -> Self {
        Self::new(tx.txid.as_str(), tx.block_hash.as_str())
    }

    /// Spent output to the spending transaction; `None` if the input names no output.
    pub fn input(tx: &Transaction, input: &TxInput) -> Option<Self> {
        input
            .spent_output_id()
            .map(|spent| Self::new(spent, tx.txid.as_str()))
    }

    /// Block subsidy output to the coinbase transaction spending it.
    pub fn coinbase_input(tx: &Transaction) -> Self {
        Self::new(coinbase_output_id(tx.block_hash.as_str()), tx.txid.as_str())
    }

    /// Transaction to one of its outputs.
    pub fn output(tx: &Transaction, output: &TxOutput) -> Self {
        Self::new(tx.txid.as_str(), tx.output_id(output.n))
    }

    /// Output to an address it is locked to.
    pub fn locked(tx: &Transaction, output: &TxOutput, address: &str) -> Self {
        Self::new(tx.output_id(output.n), address)
    }
}

impl CsvRecord for Relationship {
    fn headers(&self) -> &'static [&'static str] {
        RELATIONSHIP_HEADERS
    }

    fn row(&self) -> Vec<String> {
        vec![self.start.clone(), self.end.clone()]
    }
}
