//! Error types for chainetl

use std::sync::Arc;
use thiserror::Error;

/// Result type alias for chainetl operations
pub type Result<T> = std::result::Result<T, EtlError>;

/// Main error type for chainetl
///
/// Cloneable so a single outcome can be handed to every waiter of a unit of
/// work or store message. Non-clone sources are held behind an `Arc`.
#[derive(Error, Debug, Clone)]
pub enum EtlError {
    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    /// `csv::Error` already renders its own "CSV error:" prefix.
    #[error("{0}")]
    Csv(Arc<csv::Error>),

    #[error("Serialization error: {0}")]
    Serialization(Arc<serde_json::Error>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Unknown file key: {0}")]
    UnknownFile(String),

    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Resource is closed")]
    Closed,

    #[error("Resource already closed")]
    AlreadyClosed,

    #[error("Work cancelled before completion")]
    Cancelled,

    #[error("Task failed: {0}")]
    Task(String),
}

impl EtlError {
    /// True for errors caused by shutdown or cancellation rather than by the work itself
    pub fn is_shutdown(&self) -> bool {
        matches!(self, EtlError::Closed | EtlError::AlreadyClosed | EtlError::Cancelled)
    }
}

impl From<std::io::Error> for EtlError {
    fn from(err: std::io::Error) -> Self {
        EtlError::Io(Arc::new(err))
    }
}

impl From<csv::Error> for EtlError {
    fn from(err: csv::Error) -> Self {
        EtlError::Csv(Arc::new(err))
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::Serialization(Arc::new(err))
    }
}
