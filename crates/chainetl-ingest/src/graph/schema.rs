//! Record kinds of the Neo4j bulk-import layout and their file keys

use std::fmt;

/// One CSV file of the graph: four node kinds and six relationship kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Blocks,
    Transactions,
    Outputs,
    Addresses,
    /// Block to previous block
    Chain,
    /// Block to its coinbase output
    Coinbase,
    /// Transaction to block
    Include,
    /// Spent output to transaction
    In,
    /// Transaction to output
    Out,
    /// Output to address
    Locked,
}

impl RecordKind {
    pub const ALL: [RecordKind; 10] = [
        RecordKind::Blocks,
        RecordKind::Transactions,
        RecordKind::Outputs,
        RecordKind::Addresses,
        RecordKind::Chain,
        RecordKind::Coinbase,
        RecordKind::Include,
        RecordKind::In,
        RecordKind::Out,
        RecordKind::Locked,
    ];

    pub fn file_key(self) -> &'static str {
        match self {
            RecordKind::Blocks => "blocks",
            RecordKind::Transactions => "transactions",
            RecordKind::Outputs => "outputs",
            RecordKind::Addresses => "addresses",
            RecordKind::Chain => "chain",
            RecordKind::Coinbase => "coinbase",
            RecordKind::Include => "include",
            RecordKind::In => "in",
            RecordKind::Out => "out",
            RecordKind::Locked => "locked",
        }
    }

    pub fn is_relationship(self) -> bool {
        !matches!(
            self,
            RecordKind::Blocks
                | RecordKind::Transactions
                | RecordKind::Outputs
                | RecordKind::Addresses
        )
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_key())
    }
}
