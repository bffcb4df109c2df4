//! Request/response protocol between store clients and store workers

use std::fmt;

use super::record::CsvRecord;
use crate::completion::Completion;
use chainetl_common::{EtlError, Result};

/// Work a store worker performs against one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    /// Append `rows`, writing `headers` first if the file is empty.
    Insert {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Read up to `limit` rows starting at record `line` (negative counts from the end).
    Read { line: i64, limit: i64 },
}

/// What a worker hands back through the message's completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply {
    Inserted { rows: usize },
    Read { rows: Vec<Vec<String>> },
}

impl StoreReply {
    /// Rows returned by a read; empty for an insert.
    pub fn into_rows(self) -> Vec<Vec<String>> {
        match self {
            StoreReply::Read { rows } => rows,
            StoreReply::Inserted { .. } => Vec::new(),
        }
    }
}

/// One request addressed to a logical file, finished exactly once by the
/// worker that receives it.
///
/// A message dropped before it is finished, for instance while still queued in
/// a store that goes away, resolves its waiters with [`EtlError::Cancelled`].
#[derive(Debug)]
pub struct StoreMessage {
    pub file_key: String,
    pub request: StoreRequest,
    reply: Reply,
}

impl StoreMessage {
    pub fn new(file_key: impl Into<String>, request: StoreRequest) -> Self {
        Self {
            file_key: file_key.into(),
            request,
            reply: Reply {
                completion: Completion::new(),
            },
        }
    }

    /// Render `records` into an insert message. The header row is taken from
    /// the first record.
    pub fn insert(file_key: impl Into<String>, records: &[Box<dyn CsvRecord>]) -> Self {
        let headers = records
            .first()
            .map(|record| {
                record
                    .headers()
                    .iter()
                    .map(|header| header.to_string())
                    .collect()
            })
            .unwrap_or_default();
        let rows = records.iter().map(|record| record.row()).collect();
        Self::new(file_key, StoreRequest::Insert { headers, rows })
    }

    pub fn read(file_key: impl Into<String>, line: i64, limit: i64) -> Self {
        Self::new(file_key, StoreRequest::Read { line, limit })
    }

    /// Record the outcome; later calls are ignored.
    pub fn finish(&self, outcome: Result<StoreReply>) -> bool {
        self.reply.completion.finish(outcome)
    }

    /// Suspend until a worker has finished this message.
    pub async fn wait(&self) -> Result<StoreReply> {
        self.reply.completion.wait().await
    }

    /// Handle for waiting on the message after it has been handed off.
    pub fn completion(&self) -> Completion<StoreReply> {
        self.reply.completion.clone()
    }

    pub(crate) fn into_parts(self) -> (String, StoreRequest, Reply) {
        (self.file_key, self.request, self.reply)
    }
}

/// Worker-side half of a message's completion
#[derive(Debug)]
pub(crate) struct Reply {
    completion: Completion<StoreReply>,
}

impl Reply {
    pub(crate) fn finish(self, outcome: Result<StoreReply>) {
        self.completion.finish(outcome);
    }
}

impl Drop for Reply {
    fn drop(&mut self) {
        self.completion.finish(Err(EtlError::Cancelled));
    }
}

impl fmt::Display for StoreMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            StoreRequest::Insert { rows, .. } => {
                write!(f, "insert {} rows into {}", rows.len(), self.file_key)
            }
            StoreRequest::Read { line, limit } => {
                write!(f, "read {} from line {} of {}", limit, line, self.file_key)
            }
        }
    }
}
