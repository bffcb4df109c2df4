//! Wiring of the three loader stages and the submit/close surface

use chainetl_common::{EtlError, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::handlers::{BlockHashHandler, BlockRangeHandler, BlockSink};
use super::stage::{PipelineMessage, SinkStage, TransformStage};
use super::unit_of_work::{LoadStats, UnitOfWork};
use crate::database::DbTx;
use crate::source::NodeSource;
use crate::types::BlockRange;

/// Runs the range, hash and block stages as independent tasks
///
/// The first stage to fail cancels the shared token; the others then stop
/// without error, so [`LoaderManager::close`] reports the failure that caused
/// the shutdown.
pub struct LoaderManager {
    input: Mutex<Option<mpsc::Sender<PipelineMessage<BlockRange>>>>,
    stages: Mutex<Option<JoinSet<Result<()>>>>,
    cancel: CancellationToken,
}

impl LoaderManager {
    /// Start the stages; every link between them holds `capacity` messages.
    /// Must be called from within a tokio runtime.
    pub fn new(source: Arc<dyn NodeSource>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EtlError::Validation(
                "pipeline capacity must be greater than 0".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let (input, ranges) = mpsc::channel(capacity);

        let (range_stage, hashes) = TransformStage::new(
            "block_range",
            ranges,
            BlockRangeHandler::new(Arc::clone(&source)),
            capacity,
            cancel.clone(),
        );
        let (hash_stage, blocks) = TransformStage::new(
            "block_hash",
            hashes,
            BlockHashHandler::new(source),
            capacity,
            cancel.clone(),
        );
        let sink_stage = SinkStage::new("block_sink", blocks, BlockSink, cancel.clone());

        let mut stages = JoinSet::new();
        spawn_stage(&mut stages, &cancel, range_stage.run());
        spawn_stage(&mut stages, &cancel, hash_stage.run());
        spawn_stage(&mut stages, &cancel, sink_stage.run());

        info!(capacity, "loader pipeline started");
        Ok(Self {
            input: Mutex::new(Some(input)),
            stages: Mutex::new(Some(stages)),
            cancel,
        })
    }

    /// Queue `range` for loading into `tx` and return its stats handle.
    ///
    /// Suspends only while the first stage is at capacity. Fails with
    /// [`EtlError::Closed`] after `close` or once a stage has failed.
    pub async fn submit(&self, range: BlockRange, tx: Box<dyn DbTx>) -> Result<LoadStats> {
        let sender = self.input.lock().await.clone().ok_or(EtlError::Closed)?;
        if self.cancel.is_cancelled() {
            return Err(EtlError::Closed);
        }

        let unit_of_work = UnitOfWork::new(range, tx);
        let stats = unit_of_work.stats().clone();
        let msg = PipelineMessage::new(unit_of_work, range);

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(EtlError::Closed),
            sent = sender.send(msg) => sent.map(|_| stats).map_err(|_| EtlError::Closed),
        }
    }

    /// Token cancelled when any stage fails; cancelling it stops the pipeline.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Close the entry queue, let the stages drain and join them.
    ///
    /// Returns the first stage error. A second call returns
    /// [`EtlError::AlreadyClosed`].
    pub async fn close(&self) -> Result<()> {
        let input = self.input.lock().await.take();
        if input.is_none() {
            return Err(EtlError::AlreadyClosed);
        }
        drop(input);

        let mut first_error = None;
        if let Some(mut stages) = self.stages.lock().await.take() {
            while let Some(joined) = stages.join_next().await {
                let outcome = joined
                    .map_err(|err| EtlError::Task(err.to_string()))
                    .and_then(|outcome| outcome);
                if let Err(err) = outcome {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => {
                warn!(error = %err, "loader pipeline stopped with error");
                Err(err)
            }
            None => {
                info!("loader pipeline closed");
                Ok(())
            }
        }
    }
}

/// Spawn a stage that cancels the pipeline if it fails or panics.
fn spawn_stage<F>(stages: &mut JoinSet<Result<()>>, cancel: &CancellationToken, stage: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let guard = cancel.clone().drop_guard();
    stages.spawn(async move {
        let outcome = stage.await;
        if outcome.is_ok() {
            let _ = guard.disarm();
        }
        outcome
    });
}
