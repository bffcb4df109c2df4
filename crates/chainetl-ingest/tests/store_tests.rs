//! CSV store integration tests through the graph database

mod common;

use chainetl_common::EtlError;
use chainetl_ingest::database::{Database, DbTx};
use chainetl_ingest::graph::{GraphDatabase, RecordKind};
use chainetl_ingest::types::Entity;
use chainetl_ingest::StoreConfig;
use common::block;
use std::sync::Arc;
use tokio::task::JoinSet;

fn load_block(tx: &mut impl DbTx, height: i64) {
    let (header, transactions) = block(height).into_parts();
    tx.add_entity(Entity::BlockHeader(header));
    for transaction in transactions {
        tx.add_entity(Entity::Transaction(transaction));
    }
}

// ============================================================================
// Concurrent Writers
// ============================================================================

#[tokio::test]
async fn test_concurrent_commits_do_not_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::graph(dir.path()).with_workers(4);
    let db = Arc::new(GraphDatabase::new(&config).unwrap());

    let mut commits = JoinSet::new();
    for height in 1..=8i64 {
        let db = Arc::clone(&db);
        commits.spawn(async move {
            let mut tx = db.new_tx()?;
            load_block(&mut tx, height);
            tx.commit().await
        });
    }
    while let Some(joined) = commits.join_next().await {
        joined.unwrap().unwrap();
    }
    db.close().await.unwrap();

    let transactions = std::fs::read_to_string(dir.path().join("transactions.csv")).unwrap();
    let lines: Vec<&str> = transactions.lines().collect();
    let expected_rows: i64 = (1..=8).map(|height| height + 1).sum();
    assert_eq!(lines.len() as i64, 1 + expected_rows);
    assert_eq!(lines[0], "txID:id,size:int,time:int,lockTime:int");
    assert_eq!(lines.iter().filter(|line| line.starts_with("txID")).count(), 1);

    // Each commit's rows land as one contiguous run: a coinbase followed by its transfers.
    let mut index = 1;
    while index < lines.len() {
        let txid = lines[index].split(',').next().unwrap();
        let height: usize = txid.trim_start_matches("cb").parse().unwrap();
        for offset in 0..height {
            let expected = format!("tx{height}_{offset},");
            assert!(lines[index + 1 + offset].starts_with(&expected));
        }
        index += 1 + height;
    }
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_read_from_end_of_blocks_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = GraphDatabase::open(dir.path()).unwrap();

    let mut tx = db.new_tx().unwrap();
    for height in 0..=3 {
        load_block(&mut tx, height);
    }
    tx.commit().await.unwrap();

    let store = db.store();
    let last = store.read("blocks", -1, 1).await.unwrap();
    assert_eq!(last[0][0], "block3");
    let second_last = store.read("blocks", -2, 1).await.unwrap();
    assert_eq!(second_last[0][0], "block2");
    let all = store.read("blocks", 0, 0).await.unwrap();
    assert_eq!(all.len(), 4);

    assert_eq!(db.last_block_number().await.unwrap(), 3);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_paginated_reads_reuse_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let db = GraphDatabase::open(dir.path()).unwrap();

    let mut tx = db.new_tx().unwrap();
    for height in 0..=5 {
        load_block(&mut tx, height);
    }
    tx.commit().await.unwrap();

    let store = db.store();
    let key = RecordKind::Transactions.file_key();
    let mut txids = Vec::new();
    let mut line = 1;
    loop {
        let page = store.read(key, line, 4).await.unwrap();
        if page.is_empty() {
            break;
        }
        line += page.len() as i64;
        txids.extend(page.into_iter().map(|row| row[0].clone()));
    }

    assert_eq!(txids.len(), 21);
    assert_eq!(txids.first().map(String::as_str), Some("cb0"));
    let scanned = store.file(key).unwrap().records_scanned().unwrap();
    assert_eq!(scanned, 1 + 21);
    db.close().await.unwrap();
}

#[tokio::test]
async fn test_unknown_key_and_closed_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = GraphDatabase::open(dir.path()).unwrap();

    assert!(matches!(
        db.store().read("nodes", 0, 0).await,
        Err(EtlError::UnknownFile(key)) if key == "nodes"
    ));

    db.close().await.unwrap();
    assert!(matches!(db.close().await, Err(EtlError::AlreadyClosed)));
    assert!(matches!(
        db.last_block_number().await,
        Err(EtlError::Closed)
    ));
}
