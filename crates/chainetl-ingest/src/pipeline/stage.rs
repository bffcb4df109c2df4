//! Generic pipeline stages
//!
//! A stage owns its input receiver, its output sender and the loop between
//! them. Closing a stage's input drains it and then closes its output, so
//! shutdown cascades down the chain. Every receive and send is raced against
//! the pipeline's cancellation token so no stage waits on a peer that exited.

use async_trait::async_trait;
use chainetl_common::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::unit_of_work::UnitOfWork;

/// A unit of work and the payload produced for it by the previous stage
pub struct PipelineMessage<T> {
    pub unit_of_work: UnitOfWork,
    pub payload: T,
}

impl<T> PipelineMessage<T> {
    pub fn new(unit_of_work: UnitOfWork, payload: T) -> Self {
        Self {
            unit_of_work,
            payload,
        }
    }
}

/// Step that maps one payload to the next
#[async_trait]
pub trait Transform<S, D>: Send + Sync {
    async fn transform(&self, input: S) -> Result<D>;
}

/// Terminal step that feeds a payload into the unit of work
#[async_trait]
pub trait SinkHandler<S>: Send + Sync {
    async fn consume(&self, unit_of_work: &mut UnitOfWork, input: S) -> Result<()>;
}

async fn next_message<T>(
    input: &mut mpsc::Receiver<PipelineMessage<T>>,
    cancel: &CancellationToken,
) -> Option<PipelineMessage<T>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        msg = input.recv() => msg,
    }
}

pub struct TransformStage<S, D, H> {
    name: &'static str,
    input: mpsc::Receiver<PipelineMessage<S>>,
    output: mpsc::Sender<PipelineMessage<D>>,
    handler: H,
    cancel: CancellationToken,
}

impl<S, D, H> TransformStage<S, D, H>
where
    S: Send + 'static,
    D: Send + 'static,
    H: Transform<S, D>,
{
    /// Build a stage reading from `input`; returns it with the receiving end of
    /// its new output link of `capacity` messages.
    pub fn new(
        name: &'static str,
        input: mpsc::Receiver<PipelineMessage<S>>,
        handler: H,
        capacity: usize,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<PipelineMessage<D>>) {
        let (output, downstream) = mpsc::channel(capacity);
        let stage = Self {
            name,
            input,
            output,
            handler,
            cancel,
        };
        (stage, downstream)
    }

    /// Process messages until the input closes, the pipeline is cancelled, or
    /// a transform fails. A failure marks that message's unit of work failed
    /// and becomes the stage's result.
    pub async fn run(mut self) -> Result<()> {
        debug!(stage = self.name, "stage started");
        while let Some(msg) = next_message(&mut self.input, &self.cancel).await {
            let PipelineMessage {
                unit_of_work,
                payload,
            } = msg;

            let payload = match self.handler.transform(payload).await {
                Ok(payload) => payload,
                Err(err) => {
                    error!(
                        stage = self.name,
                        range = %unit_of_work.block_range(),
                        error = %err,
                        "transform failed"
                    );
                    unit_of_work.fail(err.clone());
                    return Err(err);
                }
            };

            let next = PipelineMessage::new(unit_of_work, payload);
            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => false,
                sent = self.output.send(next) => sent.is_ok(),
            };
            if !sent {
                debug!(stage = self.name, "downstream gone, stopping");
                return Ok(());
            }
        }
        debug!(stage = self.name, cancelled = self.cancel.is_cancelled(), "stage stopped");
        Ok(())
    }
}

pub struct SinkStage<S, H> {
    name: &'static str,
    input: mpsc::Receiver<PipelineMessage<S>>,
    handler: H,
    cancel: CancellationToken,
}

impl<S, H> SinkStage<S, H>
where
    S: Send + 'static,
    H: SinkHandler<S>,
{
    pub fn new(
        name: &'static str,
        input: mpsc::Receiver<PipelineMessage<S>>,
        handler: H,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name,
            input,
            handler,
            cancel,
        }
    }

    /// Feed each payload into its unit of work, then commit it. A handler or
    /// commit error ends the stage.
    pub async fn run(mut self) -> Result<()> {
        debug!(stage = self.name, "stage started");
        while let Some(msg) = next_message(&mut self.input, &self.cancel).await {
            let PipelineMessage {
                mut unit_of_work,
                payload,
            } = msg;
            let range = unit_of_work.block_range();

            if let Err(err) = self.handler.consume(&mut unit_of_work, payload).await {
                error!(stage = self.name, range = %range, error = %err, "sink failed");
                unit_of_work.fail(err.clone());
                return Err(err);
            }
            if let Err(err) = unit_of_work.commit().await {
                error!(stage = self.name, range = %range, error = %err, "commit failed");
                return Err(err);
            }
        }
        debug!(stage = self.name, cancelled = self.cancel.is_cancelled(), "stage stopped");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::database::DbTx;
    use crate::types::{BlockRange, Entity};
    use chainetl_common::EtlError;

    struct NoopTx;

    #[async_trait]
    impl DbTx for NoopTx {
        fn add_entity(&mut self, _entity: Entity) {}

        async fn commit(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct Double;

    #[async_trait]
    impl Transform<i64, i64> for Double {
        async fn transform(&self, input: i64) -> Result<i64> {
            if input < 0 {
                return Err(EtlError::Validation(format!("negative input {input}")));
            }
            Ok(input * 2)
        }
    }

    fn message(value: i64) -> PipelineMessage<i64> {
        PipelineMessage::new(
            UnitOfWork::new(BlockRange::new(value.max(0), value.max(0)), Box::new(NoopTx)),
            value,
        )
    }

    #[tokio::test]
    async fn test_transform_forwards_in_order_and_closes_output() {
        let (tx, rx) = mpsc::channel(4);
        let (stage, mut out) = TransformStage::new("double", rx, Double, 4, CancellationToken::new());
        let handle = tokio::spawn(stage.run());

        for value in 1..=3 {
            tx.send(message(value)).await.ok().unwrap();
        }
        drop(tx);

        let mut seen = Vec::new();
        while let Some(msg) = out.recv().await {
            seen.push(msg.payload);
        }
        assert_eq!(seen, vec![2, 4, 6]);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_transform_error_fails_unit_and_stops() {
        let (tx, rx) = mpsc::channel(4);
        let (stage, mut out) = TransformStage::new("double", rx, Double, 4, CancellationToken::new());

        let bad = message(-1);
        let stats = bad.unit_of_work.stats().clone();
        tx.send(bad).await.ok().unwrap();
        tx.send(message(5)).await.ok().unwrap();

        assert!(matches!(stage.run().await, Err(EtlError::Validation(_))));
        assert!(matches!(stats.wait().await, Err(EtlError::Validation(_))));
        // Nothing forwarded; the stage's output is closed.
        assert!(out.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_stage_exits_ok() {
        let (_tx, rx) = mpsc::channel::<PipelineMessage<i64>>(1);
        let cancel = CancellationToken::new();
        let (stage, _out) = TransformStage::new("double", rx, Double, 1, cancel.clone());
        let handle = tokio::spawn(stage.run());

        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
