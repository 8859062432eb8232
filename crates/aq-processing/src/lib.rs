//! Air-Quality Cleaning Library
//!
//! Cleans station air-quality readings and fills their missing pollutant
//! values, built with Rust and Polars.
//!
//! # Overview
//!
//! The library runs one fixed pipeline:
//!
//! - **Label Normalization**: collapses free-text area types and state names
//!   to a fixed vocabulary
//! - **Temporal Derivation**: parses the sampling date and derives the year
//! - **Targeted Prefill**: fills so2/no2 for one state from its
//!   (state, type) medians
//! - **Fallback Imputation**: four grouped passes over progressively coarser
//!   keys, each consuming the previous pass's output
//! - **Schema Finalization**: drops identifier and administrative columns
//!
//! Rows are never added, removed or reordered.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use aq_processing::{Pipeline, PipelineConfig};
//! use aq_processing::io::{load_csv, write_csv};
//!
//! let df = load_csv("data.csv")?;
//!
//! let result = Pipeline::builder()
//!     .config(PipelineConfig::default())
//!     .build()?
//!     .process(df)?;
//!
//! let mut cleaned = result.data;
//! write_csv(&mut cleaned, "outputs/air_quality_cleaned_data.csv")?;
//! println!("Residual nulls: {:?}", result.summary.residual_nulls);
//! ```
//!
//! # Imputation Passes
//!
//! | Pass | Group keys         | Strategy      | Order |
//! |------|--------------------|---------------|-------|
//! | 1    | (location, type)   | forward fill  | date  |
//! | 2    | (location, type)   | backward fill | date  |
//! | 3    | (state, type)      | median fill   |       |
//! | 4    | (type)             | median fill   |       |
//!
//! Any pass can also be run on its own through [`GroupedImputer`] with an
//! [`ImputationPass`].
//!
//! # Configuration
//!
//! [`PipelineConfig`] only renames columns, extends label mappings and sets
//! output naming. It loads from JSON, with omitted fields taking defaults:
//!
//! ```rust,ignore
//! use aq_processing::PipelineConfig;
//!
//! let config = PipelineConfig::builder()
//!     .type_label("RIRUO", "Residential")
//!     .prefill_state(None::<String>)
//!     .build()?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod io;
pub mod pipeline;
pub mod profiler;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{CategoryNormalizer, SchemaFinalizer, TemporalDeriver, TemporalReport};
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use imputers::GroupedImputer;
pub use pipeline::{
    ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage, ProgressReporter,
    ProgressUpdate, imputation_passes, prefill_pass,
};
pub use profiler::DataProfiler;
pub use types::{
    CleaningSummary, ColumnFillStats, FillStrategy, ImputationPass, PassReport, PipelineResult,
    RowScope,
};
pub use utils::{is_numeric_dtype, is_temporal_dtype};
