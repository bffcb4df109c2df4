//! Per-range unit of work and the stats handle returned to submitters

use chainetl_common::{EtlError, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::completion::Completion;
use crate::database::DbTx;
use crate::types::{BlockRange, Entity, EntityKind};

#[derive(Debug)]
struct StatsInner {
    block_range: BlockRange,
    submitted: DateTime<Utc>,
    transform_end: OnceLock<DateTime<Utc>>,
    committed: OnceLock<DateTime<Utc>>,
    num_blocks: AtomicU64,
    num_transactions: AtomicU64,
    completion: Completion<()>,
}

/// Progress and outcome of one submitted block range
///
/// Cheap to clone; every clone observes the same unit of work.
#[derive(Debug, Clone)]
pub struct LoadStats {
    inner: Arc<StatsInner>,
}

impl LoadStats {
    fn new(block_range: BlockRange) -> Self {
        Self {
            inner: Arc::new(StatsInner {
                block_range,
                submitted: Utc::now(),
                transform_end: OnceLock::new(),
                committed: OnceLock::new(),
                num_blocks: AtomicU64::new(0),
                num_transactions: AtomicU64::new(0),
                completion: Completion::new(),
            }),
        }
    }

    pub fn block_range(&self) -> BlockRange {
        self.inner.block_range
    }

    pub fn submitted(&self) -> DateTime<Utc> {
        self.inner.submitted
    }

    /// When the range finished transforming and its commit was dispatched.
    pub fn transform_end(&self) -> Option<DateTime<Utc>> {
        self.inner.transform_end.get().copied()
    }

    pub fn committed(&self) -> Option<DateTime<Utc>> {
        self.inner.committed.get().copied()
    }

    pub fn num_blocks(&self) -> u64 {
        self.inner.num_blocks.load(Ordering::Relaxed)
    }

    pub fn num_transactions(&self) -> u64 {
        self.inner.num_transactions.load(Ordering::Relaxed)
    }

    pub fn loading_duration(&self) -> Option<TimeDelta> {
        self.transform_end().map(|end| end - self.submitted())
    }

    pub fn total_duration(&self) -> Option<TimeDelta> {
        self.committed().map(|end| end - self.submitted())
    }

    /// Suspend until the unit of work committed or failed.
    pub async fn wait(&self) -> Result<()> {
        self.inner.completion.wait().await
    }

    pub fn is_finished(&self) -> bool {
        self.inner.completion.is_finished()
    }

    fn count(&self, kind: EntityKind) {
        let counter = match kind {
            EntityKind::BlockHeader => &self.inner.num_blocks,
            EntityKind::Transaction => &self.inner.num_transactions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, outcome: Result<()>) -> bool {
        self.inner.completion.finish(outcome)
    }
}

fn fmt_delta(delta: Option<TimeDelta>) -> String {
    match delta {
        Some(delta) => format!("{:.3}s", delta.num_milliseconds() as f64 / 1000.0),
        None => "-".to_string(),
    }
}

impl fmt::Display for LoadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Loaded {} ({} transactions) in {} and committed in {}",
            self.block_range(),
            self.num_transactions(),
            fmt_delta(self.loading_duration()),
            fmt_delta(self.total_duration()),
        )
    }
}

/// A database transaction travelling through the pipeline with its stats
///
/// Owned by exactly one pipeline message at a time. Dropping it before
/// `commit` or `fail` resolves its stats as [`EtlError::Cancelled`].
pub struct UnitOfWork {
    tx: Box<dyn DbTx>,
    stats: LoadStats,
}

impl UnitOfWork {
    pub fn new(block_range: BlockRange, tx: Box<dyn DbTx>) -> Self {
        Self {
            tx,
            stats: LoadStats::new(block_range),
        }
    }

    pub fn stats(&self) -> &LoadStats {
        &self.stats
    }

    pub fn block_range(&self) -> BlockRange {
        self.stats.block_range()
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.stats.count(entity.kind());
        self.tx.add_entity(entity);
    }

    /// Commit the wrapped transaction and publish the outcome to every stats holder.
    pub async fn commit(mut self) -> Result<()> {
        let _ = self.stats.inner.transform_end.set(Utc::now());
        let outcome = self.tx.commit().await;
        let _ = self.stats.inner.committed.set(Utc::now());

        debug!(
            range = %self.block_range(),
            blocks = self.stats.num_blocks(),
            transactions = self.stats.num_transactions(),
            ok = outcome.is_ok(),
            "unit of work committed"
        );
        self.stats.finish(outcome.clone());
        outcome
    }

    /// Resolve the stats with `err` without committing.
    pub fn fail(self, err: EtlError) {
        self.stats.finish(Err(err));
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.stats.finish(Err(EtlError::Cancelled));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default, Clone)]
    struct RecordingTx {
        entities: Arc<Mutex<Vec<EntityKind>>>,
        fail_commit: bool,
    }

    #[async_trait]
    impl DbTx for RecordingTx {
        fn add_entity(&mut self, entity: Entity) {
            self.entities.lock().unwrap().push(entity.kind());
        }

        async fn commit(&mut self) -> Result<()> {
            if self.fail_commit {
                Err(EtlError::UnknownFile("blocks".into()))
            } else {
                Ok(())
            }
        }
    }

    fn header() -> Entity {
        Entity::BlockHeader(crate::types::BlockHeader {
            hash: "b0".into(),
            height: 0,
            time: 0,
            size: 0,
            difficulty: 1.0,
            nonce: 0,
            version: 1,
            merkle_root: String::new(),
            previous_hash: None,
        })
    }

    #[tokio::test]
    async fn test_commit_records_counts_and_times() {
        let tx = RecordingTx::default();
        let entities = Arc::clone(&tx.entities);
        let mut uow = UnitOfWork::new(BlockRange::new(0, 0), Box::new(tx));
        let stats = uow.stats().clone();

        uow.add_entity(header());
        assert_eq!(stats.num_blocks(), 1);
        assert!(!stats.is_finished());

        uow.commit().await.unwrap();
        stats.wait().await.unwrap();

        assert_eq!(entities.lock().unwrap().as_slice(), &[EntityKind::BlockHeader]);
        assert!(stats.transform_end().unwrap() <= stats.committed().unwrap());
        assert!(stats.total_duration().unwrap() >= TimeDelta::zero());
        assert!(stats
            .to_string()
            .starts_with("Loaded blocks 0 - 0 (0 transactions) in "));
    }

    #[tokio::test]
    async fn test_commit_error_reaches_waiters() {
        let tx = RecordingTx {
            fail_commit: true,
            ..Default::default()
        };
        let uow = UnitOfWork::new(BlockRange::new(0, 0), Box::new(tx));
        let stats = uow.stats().clone();

        assert!(uow.commit().await.is_err());
        assert!(matches!(stats.wait().await, Err(EtlError::UnknownFile(_))));
    }

    #[tokio::test]
    async fn test_dropped_unit_resolves_cancelled() {
        let uow = UnitOfWork::new(BlockRange::new(1, 2), Box::new(RecordingTx::default()));
        let stats = uow.stats().clone();
        drop(uow);

        assert!(matches!(stats.wait().await, Err(EtlError::Cancelled)));
        assert!(stats.committed().is_none());
        assert!(stats.to_string().ends_with("in - and committed in -"));
    }

    #[tokio::test]
    async fn test_fail_keeps_first_outcome() {
        let uow = UnitOfWork::new(BlockRange::new(0, 3), Box::new(RecordingTx::default()));
        let stats = uow.stats().clone();
        uow.fail(EtlError::Source("node unreachable".into()));

        assert!(matches!(stats.wait().await, Err(EtlError::Source(_))));
    }
}
