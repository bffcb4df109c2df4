//! Single-fire completion signal shared between a producer and its waiters.
//!
//! A [`Completion`] is finished exactly once; later `finish` calls are ignored.
//! Any number of clones may `wait` on it, concurrently or repeatedly, and all
//! observe the same outcome.

use chainetl_common::{EtlError, Result};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct Completion<T> {
    slot: Arc<watch::Sender<Option<Result<T>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            slot: Arc::new(slot),
        }
    }

    /// Store the outcome and release every waiter.
    ///
    /// Returns `false` if the completion had already fired, in which case the
    /// new outcome is discarded.
    pub fn finish(&self, outcome: Result<T>) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
            true
        })
    }

    pub fn is_finished(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

impl<T: Clone> Completion<T> {
    /// Suspend until the completion fires and return its outcome.
    pub async fn wait(&self) -> Result<T> {
        let mut rx = self.slot.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| EtlError::Cancelled)?
            .clone();
        outcome.unwrap_or(Err(EtlError::Cancelled))
    }
}
