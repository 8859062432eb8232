//! Missing-value profiling for diagnostics.
//!
//! This module provides read-only summaries of a table:
//! - Per-column missing proportions
//! - Label counts for categorical columns
//! - Per-group medians under a grouping key
//!
//! None of these change the data. They back the CLI `--dry-run` preview
//! and are handy when deciding whether a run left gaps.

use crate::error::Result;
use crate::imputers::partition_rows;
use crate::utils::{column_as_f64, column_as_strings, ensure_columns, median};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Missing-value share of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
    /// Share of rows that are null (0.0 - 1.0).
    pub null_proportion: f64,
}

/// How often one label occurs in a column. `label` is `None` for nulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub label: Option<String>,
    pub count: usize,
}

/// Median of a numeric column inside one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMedian {
    pub key: Vec<Option<String>>,
    pub rows: usize,
    pub non_null: usize,
    /// `None` when the group has no non-null value.
    pub median: Option<f64>,
}

/// Data profiler for missing-value diagnostics.
pub struct DataProfiler;

impl DataProfiler {
    /// Missing proportion of every column, highest first. Ties keep table
    /// order.
    pub fn missing_proportions(df: &DataFrame) -> Vec<ColumnMissing> {
        let height = df.height();
        let mut profile: Vec<ColumnMissing> = df
            .get_columns()
            .iter()
            .map(|col| {
                let null_count = col.null_count();
                ColumnMissing {
                    name: col.name().to_string(),
                    dtype: col.dtype().to_string(),
                    null_count,
                    null_proportion: if height > 0 {
                        null_count as f64 / height as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        profile.sort_by(|a, b| b.null_proportion.total_cmp(&a.null_proportion));
        profile
    }

    /// Occurrences of each label in `column`, most frequent first. Equal
    /// counts are ordered by label, with nulls last.
    pub fn category_counts(df: &DataFrame, column: &str) -> Result<Vec<CategoryCount>> {
        let mut counts: HashMap<Option<String>, usize> = HashMap::new();
        for label in column_as_strings(df, column)? {
            *counts.entry(label).or_default() += 1;
        }

        let mut counts: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(label, count)| CategoryCount { label, count })
            .collect();
        counts.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| match (&a.label, &b.label) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
        });
        Ok(counts)
    }

    /// Median of `column` within each group of `keys`, in first-seen group
    /// order. These are the values a median pass over the same keys would
    /// fill with.
    pub fn group_medians<S: AsRef<str>>(
        df: &DataFrame,
        keys: &[S],
        column: &str,
    ) -> Result<Vec<GroupMedian>> {
        ensure_columns(df, keys)?;
        let values = column_as_f64(df, column)?;
        let partition = partition_rows(df, keys, &vec![true; df.height()])?;

        Ok(partition
            .keys
            .into_iter()
            .zip(partition.rows)
            .map(|(key, rows)| {
                let mut present: Vec<f64> = rows.iter().filter_map(|&r| values[r]).collect();
                GroupMedian {
                    key,
                    rows: rows.len(),
                    non_null: present.len(),
                    median: median(&mut present),
                }
            })
            .collect())
    }
}
