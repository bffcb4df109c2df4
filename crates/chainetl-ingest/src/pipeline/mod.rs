//! Staged concurrent loader pipeline
//!
//! ```text
//! submit(range, tx) -> [block_range] -> [block_hash] -> [block_sink] -> commit
//!                      range->hashes    hashes->blocks   blocks->entities
//! ```
//!
//! Each submitted range travels as a [`UnitOfWork`] moved from stage to stage
//! over bounded channels, so a full link suspends its producer.

pub mod handlers;
pub mod manager;
pub mod stage;
pub mod unit_of_work;

pub use handlers::{BlockHashHandler, BlockRangeHandler, BlockSink};
pub use manager::LoaderManager;
pub use stage::{PipelineMessage, SinkHandler, SinkStage, Transform, TransformStage};
pub use unit_of_work::{LoadStats, UnitOfWork};
