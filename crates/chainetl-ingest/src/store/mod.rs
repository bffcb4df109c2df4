//! Worker-pool CSV store
//!
//! A [`CsvStore`] owns one [`FileHandle`] per logical file key and a fixed pool
//! of workers draining a shared bounded queue of [`StoreMessage`]s. Clients
//! either `dispatch` a message and keep its completion handle, or use the
//! `send_*` helpers that dispatch and wait.
//!
//! Messages for the same file may be handled by different workers in any
//! order. Callers that need a read to observe an earlier insert must wait for
//! the insert before dispatching the read, or run the store with one worker.

pub mod file;
pub mod message;
pub mod record;

pub use file::FileHandle;
pub use message::{StoreMessage, StoreReply, StoreRequest};
pub use record::{field_by_header, CsvRecord};

use chainetl_common::{EtlError, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::completion::Completion;
use crate::config::StoreConfig;

type Files = Arc<HashMap<String, Arc<FileHandle>>>;

pub struct CsvStore {
    files: Files,
    sender: Mutex<Option<mpsc::Sender<StoreMessage>>>,
    workers: Mutex<Option<JoinSet<()>>>,
}

impl CsvStore {
    /// Register the configured files and start the worker pool.
    ///
    /// Files are opened lazily by the first message that touches them. Must be
    /// called from within a tokio runtime.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;

        let files: Files = Arc::new(
            config
                .files
                .iter()
                .map(|(key, path)| (key.clone(), Arc::new(FileHandle::new(path))))
                .collect(),
        );

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let queue = Arc::new(Mutex::new(receiver));
        let mut workers = JoinSet::new();
        for id in 0..config.workers {
            workers.spawn(run_worker(id, Arc::clone(&queue), Arc::clone(&files)));
        }

        info!(
            files = files.len(),
            workers = config.workers,
            queue_capacity = config.queue_capacity,
            "CSV store started"
        );

        Ok(Self {
            files,
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(Some(workers)),
        })
    }

    /// Queue `msg` for a worker and return its completion handle.
    ///
    /// Suspends while the queue is full. Fails with [`EtlError::Closed`] once
    /// the store has been closed; the dropped message resolves as cancelled.
    pub async fn dispatch(&self, msg: StoreMessage) -> Result<Completion<StoreReply>> {
        let sender = self.sender.lock().await.clone().ok_or(EtlError::Closed)?;
        let completion = msg.completion();
        sender.send(msg).await.map_err(|_| EtlError::Closed)?;
        Ok(completion)
    }

    /// Dispatch `msg` and wait for its reply.
    pub async fn send_msg(&self, msg: StoreMessage) -> Result<StoreReply> {
        self.dispatch(msg).await?.wait().await
    }

    /// Dispatch every message, then wait for all of them.
    ///
    /// Returns the first error in message order. Messages that succeeded are
    /// not undone when another fails.
    pub async fn send_msgs(&self, msgs: Vec<StoreMessage>) -> Result<Vec<StoreReply>> {
        let mut completions = Vec::with_capacity(msgs.len());
        let mut dispatch_error = None;
        for msg in msgs {
            match self.dispatch(msg).await {
                Ok(completion) => completions.push(completion),
                Err(err) => {
                    dispatch_error = Some(err);
                    break;
                }
            }
        }

        let outcomes = join_all(completions.iter().map(|completion| completion.wait())).await;
        if let Some(err) = dispatch_error {
            return Err(err);
        }
        outcomes.into_iter().collect()
    }

    /// Append `records` to the file registered under `file_key`.
    pub async fn insert(&self, file_key: &str, records: &[Box<dyn CsvRecord>]) -> Result<usize> {
        match self.send_msg(StoreMessage::insert(file_key, records)).await? {
            StoreReply::Inserted { rows } => Ok(rows),
            StoreReply::Read { .. } => Ok(0),
        }
    }

    /// Read up to `limit` rows from `file_key` starting at record `line`.
    pub async fn read(&self, file_key: &str, line: i64, limit: i64) -> Result<Vec<Vec<String>>> {
        Ok(self
            .send_msg(StoreMessage::read(file_key, line, limit))
            .await?
            .into_rows())
    }

    pub fn file(&self, file_key: &str) -> Option<Arc<FileHandle>> {
        self.files.get(file_key).cloned()
    }

    pub async fn is_closed(&self) -> bool {
        self.sender.lock().await.is_none()
    }

    /// Stop accepting messages, let the workers drain the queue, then close
    /// every file. A second call returns [`EtlError::AlreadyClosed`].
    pub async fn close(&self) -> Result<()> {
        let sender = self.sender.lock().await.take();
        if sender.is_none() {
            return Err(EtlError::AlreadyClosed);
        }
        drop(sender);

        let mut first_error = None;
        if let Some(mut workers) = self.workers.lock().await.take() {
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    warn!(error = %err, "store worker ended abnormally");
                    first_error.get_or_insert(EtlError::Task(err.to_string()));
                }
            }
        }

        let mut opened = 0;
        for (key, file) in self.files.iter() {
            match file.close() {
                Ok(true) => opened += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(file_key = %key, error = %err, "failed to close store file");
                    first_error.get_or_insert(err);
                }
            }
        }

        info!(files_closed = opened, "CSV store closed");
        first_error.map_or(Ok(()), Err)
    }
}

async fn run_worker(id: usize, queue: Arc<Mutex<mpsc::Receiver<StoreMessage>>>, files: Files) {
    debug!(worker = id, "store worker started");
    loop {
        let msg = {
            let mut receiver = queue.lock().await;
            receiver.recv().await
        };
        let Some(msg) = msg else {
            break;
        };

        let (file_key, request, reply) = msg.into_parts();
        let outcome = handle_request(&files, &file_key, request).await;
        if let Err(err) = &outcome {
            warn!(worker = id, file_key = %file_key, error = %err, "store request failed");
        }
        reply.finish(outcome);
    }
    debug!(worker = id, "store worker stopped");
}

async fn handle_request(files: &Files, file_key: &str, request: StoreRequest) -> Result<StoreReply> {
    let file = files
        .get(file_key)
        .cloned()
        .ok_or_else(|| EtlError::UnknownFile(file_key.to_string()))?;

    tokio::task::spawn_blocking(move || match request {
        StoreRequest::Insert { headers, rows } => file
            .write_all(&headers, &rows)
            .map(|rows| StoreReply::Inserted { rows }),
        StoreRequest::Read { line, limit } => {
            file.read(line, limit).map(|rows| StoreReply::Read { rows })
        }
    })
    .await
    .map_err(|err| EtlError::Task(err.to_string()))?
}
