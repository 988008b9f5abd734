//! Pipeline module.
//!
//! This module provides the cleaning pipeline, its builder and the
//! progress and cancellation types it reports through.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder};
pub use progress::{
    CancellationToken, ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
