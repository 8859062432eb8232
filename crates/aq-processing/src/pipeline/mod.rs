//! Pipeline module.
//!
//! This module provides the cleaning pipeline, its fixed pass sequence and
//! progress reporting.

mod builder;
pub mod progress;

pub use builder::{Pipeline, PipelineBuilder, imputation_passes, prefill_pass};
pub use progress::{ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate};
