//! Loader pipeline integration tests
//!
//! Drives the three-stage pipeline against an in-memory six-block chain and
//! checks ordering, error propagation and shutdown behaviour.

mod common;

use chainetl_common::EtlError;
use chainetl_ingest::database::Database;
use chainetl_ingest::graph::GraphDatabase;
use chainetl_ingest::pipeline::LoaderManager;
use chainetl_ingest::types::{BlockRange, Entity};
use common::{block, transactions_in, MockDbTx, MockSource};
use std::sync::Arc;

fn loader(source: &Arc<MockSource>) -> LoaderManager {
    LoaderManager::new(source.clone(), 1).unwrap()
}

// ============================================================================
// Happy Path
// ============================================================================

#[tokio::test]
async fn test_full_range_commits_in_source_order() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);
    let tx = MockDbTx::default();

    let stats = loader
        .submit(BlockRange::new(0, 5), Box::new(tx.clone()))
        .await
        .unwrap();
    stats.wait().await.unwrap();

    assert_eq!(stats.num_blocks(), 6);
    assert_eq!(stats.num_transactions(), transactions_in(0, 5));
    assert_eq!(tx.commits(), 1);

    let mut expected = Vec::new();
    for height in 0..=5 {
        let (header, transactions) = block(height).into_parts();
        expected.push(Entity::BlockHeader(header));
        expected.extend(transactions.into_iter().map(Entity::Transaction));
    }
    assert_eq!(tx.entities(), expected);

    assert!(stats.transform_end().unwrap() <= stats.committed().unwrap());
    loader.close().await.unwrap();
}

#[tokio::test]
async fn test_batches_commit_independently() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);

    let ranges = [
        BlockRange::new(0, 1),
        BlockRange::new(2, 3),
        BlockRange::new(4, 5),
    ];
    let mut submitted = Vec::new();
    for range in ranges {
        let tx = MockDbTx::default();
        let stats = loader.submit(range, Box::new(tx.clone())).await.unwrap();
        submitted.push((range, tx, stats));
    }
    loader.close().await.unwrap();

    for (range, tx, stats) in submitted {
        stats.wait().await.unwrap();
        assert_eq!(stats.block_range(), range);
        assert_eq!(stats.num_blocks(), 2);
        assert_eq!(stats.num_transactions(), transactions_in(range.start, range.end));
        assert_eq!(tx.commits(), 1);
    }
}

// ============================================================================
// Error Propagation
// ============================================================================

#[tokio::test]
async fn test_range_past_tip_fails_and_writes_nothing() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);
    let tx = MockDbTx::default();

    let stats = loader
        .submit(BlockRange::new(0, 6), Box::new(tx.clone()))
        .await
        .unwrap();

    assert!(matches!(stats.wait().await, Err(EtlError::Source(_))));
    assert!(matches!(loader.close().await, Err(EtlError::Source(_))));
    assert!(tx.entities().is_empty());
    assert_eq!(tx.commits(), 0);
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);
    let tx = MockDbTx::default();

    let stats = loader
        .submit(BlockRange::new(5, 4), Box::new(tx.clone()))
        .await
        .unwrap();

    assert!(matches!(stats.wait().await, Err(EtlError::Validation(_))));
    assert!(matches!(loader.close().await, Err(EtlError::Validation(_))));
    // Rejected before reaching the node.
    assert_eq!(source.calls(), 0);
    assert_eq!(tx.commits(), 0);
}

#[tokio::test]
async fn test_commit_failure_stops_pipeline() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);

    let stats = loader
        .submit(BlockRange::new(0, 1), Box::new(MockDbTx::failing()))
        .await
        .unwrap();

    assert!(matches!(stats.wait().await, Err(EtlError::UnknownFile(_))));
    assert!(matches!(loader.close().await, Err(EtlError::UnknownFile(_))));
}

#[tokio::test]
async fn test_submit_after_failure_is_closed() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);

    let stats = loader
        .submit(BlockRange::new(0, 9), Box::new(MockDbTx::default()))
        .await
        .unwrap();
    assert!(stats.wait().await.is_err());

    // The failing stage has cancelled the pipeline.
    loader.cancel_token().cancelled().await;
    let next = loader
        .submit(BlockRange::new(0, 1), Box::new(MockDbTx::default()))
        .await;
    assert!(matches!(next, Err(EtlError::Closed)));
    assert!(loader.close().await.is_err());
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_close_twice_and_submit_after_close() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);

    loader.close().await.unwrap();
    assert!(matches!(loader.close().await, Err(EtlError::AlreadyClosed)));

    let submitted = loader
        .submit(BlockRange::new(0, 0), Box::new(MockDbTx::default()))
        .await;
    assert!(matches!(submitted, Err(EtlError::Closed)));
}

#[tokio::test]
async fn test_cancel_resolves_pending_units() {
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);
    loader.cancel_token().cancel();

    let submitted = loader
        .submit(BlockRange::new(0, 0), Box::new(MockDbTx::default()))
        .await;
    assert!(matches!(submitted, Err(EtlError::Closed)));
    // Cancelled stages stop without an error of their own.
    loader.close().await.unwrap();
}

// ============================================================================
// End to End
// ============================================================================

#[tokio::test]
async fn test_pipeline_into_graph_files() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(MockSource::new(6));
    let loader = loader(&source);
    let db = GraphDatabase::open(dir.path()).unwrap();

    let mut submitted = Vec::new();
    for range in [BlockRange::new(0, 2), BlockRange::new(3, 5)] {
        let tx = db.new_tx().unwrap();
        submitted.push(loader.submit(range, Box::new(tx)).await.unwrap());
    }
    for stats in &submitted {
        stats.wait().await.unwrap();
    }
    loader.close().await.unwrap();

    assert_eq!(db.last_block_number().await.unwrap(), 5);
    db.close().await.unwrap();

    let blocks = std::fs::read_to_string(dir.path().join("blocks.csv")).unwrap();
    assert_eq!(blocks.lines().count(), 1 + 6);
    let transactions = std::fs::read_to_string(dir.path().join("transactions.csv")).unwrap();
    assert_eq!(
        transactions.lines().count() as u64,
        1 + transactions_in(0, 5)
    );
    let chain = std::fs::read_to_string(dir.path().join("chain.csv")).unwrap();
    assert_eq!(chain.lines().count(), 1 + 5);
    assert!(chain.lines().any(|line| line == "block1,block0"));
}
