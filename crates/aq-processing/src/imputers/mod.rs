//! Imputation module for handling missing values.
//!
//! Provides the grouped fallback imputer: forward fill, backward fill and
//! median fill applied independently within groups of rows.

mod grouped;

pub use grouped::GroupedImputer;
pub(crate) use grouped::partition_rows;
