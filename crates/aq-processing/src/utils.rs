//! Shared utilities for the cleaning pipeline.
//!
//! Helpers for pulling typed values out of polars columns and for the few
//! statistics the imputers need.

use crate::error::{CleaningError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_temporal_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

// =============================================================================
// Column Access Utilities
// =============================================================================

/// Fail with [`CleaningError::ColumnNotFound`] for the first absent column.
pub fn ensure_columns<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<()> {
    for name in columns {
        let name = name.as_ref();
        if df.column(name).is_err() {
            return Err(CleaningError::ColumnNotFound(name.to_string()));
        }
    }
    Ok(())
}

/// Check if a column holds no values at all.
///
/// The CSV reader types a column with no values as String, so such a column
/// is accepted wherever numbers are expected.
#[inline]
pub fn is_all_null(column: &Column) -> bool {
    column.null_count() == column.len()
}

/// Read a numeric column as `f64` values. NaN is treated as missing.
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| CleaningError::ColumnNotFound(name.to_string()))?;

    if !is_numeric_dtype(column.dtype()) && !is_all_null(column) {
        return Err(CleaningError::TypeConversionFailed {
            column: name.to_string(),
            target_type: "Float64".to_string(),
            reason: format!("column has non-numeric dtype {}", column.dtype()),
        });
    }

    let casted = column.cast(&DataType::Float64)?;
    let values = casted
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Read any column as optional strings, for use as a grouping key or a
/// label. Nulls stay `None`.
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| CleaningError::ColumnNotFound(name.to_string()))?;
    let casted = column.cast(&DataType::String)?;
    let values = casted
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

/// Number of nulls per named column, in the order given.
pub fn null_counts<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<Vec<(String, usize)>> {
    columns
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let column = df
                .column(name)
                .map_err(|_| CleaningError::ColumnNotFound(name.to_string()))?;
            Ok((name.to_string(), column.null_count()))
        })
        .collect()
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Median of the given values; the mean of the two middle values for an
/// even count. `None` for an empty slice.
///
/// The slice is reordered in place.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

// =============================================================================
// Tests
// =============================================================================
