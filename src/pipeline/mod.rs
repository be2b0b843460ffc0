//! Per-file enhancement pipeline and its concurrent batch orchestration.

pub mod backoff;
pub mod batch;
pub mod stages;

pub use backoff::JitterBackoff;
pub use batch::{run_batch, run_pipelines, BatchReport};
pub use stages::{process_record, StageError};
