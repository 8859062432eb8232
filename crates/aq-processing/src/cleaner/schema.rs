//! Final column selection before the table is handed off for writing.

use polars::prelude::*;
use tracing::debug;

/// Drops identifier and administrative columns not needed downstream.
pub struct SchemaFinalizer;

impl SchemaFinalizer {
    /// Remove every column in `dropped` that the table carries. Absent
    /// columns are skipped. Returns the table and the names actually
    /// removed, in table order.
    ///
    /// Polars frames are positional with no index of their own, so the
    /// result is already indexed contiguously from zero.
    pub fn finalize(df: DataFrame, dropped: &[String]) -> (DataFrame, Vec<String>) {
        let present: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| dropped.iter().any(|d| d.as_str() == name.as_str()))
            .map(|name| name.to_string())
            .collect();

        for name in dropped {
            if !present.contains(name) {
                debug!("Column '{}' not present, nothing to drop", name);
            }
        }

        if present.is_empty() {
            return (df, present);
        }

        let cols_ref: Vec<PlSmallStr> = present.iter().map(|s| s.as_str().into()).collect();
        let df = df.drop_many(cols_ref);
        debug!("Dropped columns: {:?}", present);
        (df, present)
    }
}
