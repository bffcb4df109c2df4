//! chainetl Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the chainetl workspace.
//!
//! # Overview
//!
//! - **Error Handling**: the [`EtlError`] taxonomy and [`Result`] alias used by
//!   the pipeline, the CSV store and the node sources
//! - **Logging**: [`logging::LogConfig`] and [`logging::init_logging`] for
//!   console/file `tracing` output
//!
//! # Example
//!
//! ```no_run
//! use chainetl_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{EtlError, Result};
