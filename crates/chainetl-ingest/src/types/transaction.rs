//! Transaction, input and output types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::block::BlockHash;

/// A transaction as returned inside a verbose block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    /// Witness hash; equals `txid` for non-segwit transactions
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub time: i64,
    #[serde(default, rename = "locktime")]
    pub lock_time: u32,
    #[serde(default, rename = "blockhash")]
    pub block_hash: BlockHash,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// A coinbase transaction has a single input carrying coinbase data.
    pub fn is_coinbase(&self) -> bool {
        self.vin.first().is_some_and(TxInput::is_coinbase)
    }

    /// Graph id of this transaction's `n`th output.
    pub fn output_id(&self, n: u32) -> String {
        format!("{}_{}", self.txid, n)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.txid)
    }
}

/// A transaction input: either coinbase data or a reference to a previous output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    #[serde(default)]
    pub sequence: u32,
}

impl TxInput {
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }

    /// Graph id of the output this input spends, `None` for coinbase inputs.
    pub fn spent_output_id(&self) -> Option<String> {
        match (&self.txid, self.vout) {
            (Some(txid), Some(vout)) => Some(format!("{txid}_{vout}")),
            _ => None,
        }
    }
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: f64,
    pub n: u32,
    #[serde(default, rename = "scriptPubKey")]
    pub script_pubkey: ScriptPubKey,
}

impl TxOutput {
    pub fn addresses(&self) -> Vec<&str> {
        self.script_pubkey.addresses()
    }
}

/// Locking script summary. Newer nodes report a single `address`, older ones an
/// `addresses` list; both are honoured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default, rename = "type")]
    pub script_type: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl ScriptPubKey {
    pub fn addresses(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.address.iter().map(String::as_str).collect();
        for address in &self.addresses {
            if !out.contains(&address.as_str()) {
                out.push(address);
            }
        }
        out
    }
}
