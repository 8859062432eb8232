//! Table cleaning stages that surround imputation.
//!
//! This module provides:
//! - Category label normalization
//! - Date parsing and year derivation
//! - Final schema trimming

mod normalizer;
mod schema;
mod temporal;

pub use normalizer::CategoryNormalizer;
pub use schema::SchemaFinalizer;
pub use temporal::{TemporalDeriver, TemporalReport};
