//! Neo4j bulk-import graph on top of the CSV store
//!
//! Blocks, transactions, outputs and addresses become node rows; the links
//! between them become relationship rows, one CSV file per [`RecordKind`].

pub mod nodes;
pub mod relationships;
pub mod schema;

pub use nodes::{AddressNode, BlockNode, OutputNode, TransactionNode};
pub use relationships::Relationship;
pub use schema::RecordKind;

use async_trait::async_trait;
use chainetl_common::{EtlError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::StoreConfig;
use crate::database::{Database, DbTx};
use crate::store::{field_by_header, CsvRecord, CsvStore, StoreMessage};
use crate::types::{BlockHeader, Entity, Transaction};

/// Graph database writing Neo4j import files through a [`CsvStore`]
pub struct GraphDatabase {
    store: Arc<CsvStore>,
}

impl GraphDatabase {
    /// Start a store over `config`, which must register every [`RecordKind`] file key.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if let Some(kind) = RecordKind::ALL
            .iter()
            .find(|kind| !config.files.contains_key(kind.file_key()))
        {
            return Err(EtlError::Validation(format!(
                "store config has no file for {kind}"
            )));
        }
        Ok(Self {
            store: Arc::new(CsvStore::new(config)?),
        })
    }

    /// Graph files under `data_dir` with the default worker pool.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(&StoreConfig::graph(data_dir))
    }

    pub fn store(&self) -> &Arc<CsvStore> {
        &self.store
    }

    /// Height of the last block row, `None` while the blocks file is empty.
    pub async fn last_block(&self) -> Result<Option<i64>> {
        let rows = self
            .store
            .read(RecordKind::Blocks.file_key(), -1, 1)
            .await?;
        let Some(last) = rows.first() else {
            return Ok(None);
        };
        let height = field_by_header(nodes::BLOCK_HEADERS, last, "height:int")?;
        height
            .parse()
            .map(Some)
            .map_err(|err| EtlError::Parse(format!("block height {height:?}: {err}")))
    }
}

#[async_trait]
impl Database for GraphDatabase {
    type Tx = GraphTx;

    fn new_tx(&self) -> Result<GraphTx> {
        Ok(GraphTx::new(Arc::clone(&self.store)))
    }

    async fn last_block_number(&self) -> Result<i64> {
        Ok(self.last_block().await?.unwrap_or(0))
    }

    async fn close(&self) -> Result<()> {
        self.store.close().await
    }
}

/// Graph rows for one unit of work, grouped by record kind
pub struct GraphTx {
    store: Arc<CsvStore>,
    records: BTreeMap<RecordKind, Vec<Box<dyn CsvRecord>>>,
    addresses: BTreeSet<String>,
}

impl GraphTx {
    pub fn new(store: Arc<CsvStore>) -> Self {
        Self {
            store,
            records: BTreeMap::new(),
            addresses: BTreeSet::new(),
        }
    }

    /// Rows buffered for `kind`; addresses are only materialised at commit.
    pub fn buffered(&self, kind: RecordKind) -> usize {
        self.records.get(&kind).map_or(0, Vec::len)
    }

    pub fn addresses(&self) -> &BTreeSet<String> {
        &self.addresses
    }

    fn push(&mut self, kind: RecordKind, record: impl CsvRecord + 'static) {
        self.records.entry(kind).or_default().push(Box::new(record));
    }

    fn add_block_header(&mut self, header: &BlockHeader) {
        self.push(RecordKind::Blocks, BlockNode::from(header));
        if let Some(chain) = Relationship::chain(header) {
            self.push(RecordKind::Chain, chain);
        }
        self.push(RecordKind::Outputs, OutputNode::coinbase(header));
        self.push(RecordKind::Coinbase, Relationship::coinbase(header));
    }

    fn add_transaction(&mut self, tx: &Transaction) {
        self.push(RecordKind::Transactions, TransactionNode::from(tx));
        self.push(RecordKind::Include, Relationship::include(tx));

        if tx.is_coinbase() {
            self.push(RecordKind::In, Relationship::coinbase_input(tx));
        } else {
            for input in &tx.vin {
                if let Some(edge) = Relationship::input(tx, input) {
                    self.push(RecordKind::In, edge);
                }
            }
        }

        for output in &tx.vout {
            self.push(RecordKind::Outputs, OutputNode::new(tx, output));
            self.push(RecordKind::Out, Relationship::output(tx, output));
            for address in output.addresses() {
                self.addresses.insert(address.to_string());
                self.push(RecordKind::Locked, Relationship::locked(tx, output, address));
            }
        }
    }
}

#[async_trait]
impl DbTx for GraphTx {
    fn add_entity(&mut self, entity: Entity) {
        match &entity {
            Entity::BlockHeader(header) => self.add_block_header(header),
            Entity::Transaction(tx) => self.add_transaction(tx),
        }
    }

    async fn commit(&mut self) -> Result<()> {
        let mut records = std::mem::take(&mut self.records);
        let addresses = std::mem::take(&mut self.addresses);
        if !addresses.is_empty() {
            records.entry(RecordKind::Addresses).or_default().extend(
                addresses
                    .into_iter()
                    .map(|address| Box::new(AddressNode(address)) as Box<dyn CsvRecord>),
            );
        }

        let msgs: Vec<StoreMessage> = records
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(kind, rows)| StoreMessage::insert(kind.file_key(), rows))
            .collect();
        let relationship_rows: usize = records
            .iter()
            .filter(|(kind, _)| kind.is_relationship())
            .map(|(_, rows)| rows.len())
            .sum();
        debug!(messages = msgs.len(), relationship_rows, "committing graph rows");

        self.store.send_msgs(msgs).await.map(|_| ())
    }
}
