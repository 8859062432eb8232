//! Grouped fallback imputation.
//!
//! Rows are partitioned by the pass's key columns, each group is filled on
//! its own, and the filled values are scattered back to their original row
//! positions. Group enumeration order therefore never affects the output.

use crate::error::{CleaningError, Result};
use crate::types::{ColumnFillStats, FillStrategy, ImputationPass, PassReport};
use crate::utils::{
    column_as_f64, column_as_strings, ensure_columns, is_numeric_dtype, is_temporal_dtype, median,
};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// Values of the key columns for one row. A null key part is a value of
/// its own, so rows with missing identifiers still form a group.
pub(crate) type GroupKey = Vec<Option<String>>;

/// Row positions of each group, in first-seen order.
pub(crate) struct Partition {
    pub keys: Vec<GroupKey>,
    pub rows: Vec<Vec<usize>>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// Partition the rows of `df` whose `in_scope` flag is set by equal values
/// of `keys`.
pub(crate) fn partition_rows<S: AsRef<str>>(
    df: &DataFrame,
    keys: &[S],
    in_scope: &[bool],
) -> Result<Partition> {
    let key_columns = keys
        .iter()
        .map(|k| column_as_strings(df, k.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let mut index: HashMap<GroupKey, usize> = HashMap::new();
    let mut partition = Partition {
        keys: Vec::new(),
        rows: Vec::new(),
    };

    for row in (0..df.height()).filter(|&r| in_scope[r]) {
        let key: GroupKey = key_columns.iter().map(|col| col[row].clone()).collect();
        let group = *index.entry(key.clone()).or_insert_with(|| {
            partition.keys.push(key);
            partition.rows.push(Vec::new());
            partition.rows.len() - 1
        });
        partition.rows[group].push(row);
    }

    Ok(partition)
}

/// Per-row sort values for the ordering column.
enum SortKey {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl SortKey {
    fn read(df: &DataFrame, name: &str) -> Result<Self> {
        let column = df
            .column(name)
            .map_err(|_| CleaningError::ColumnNotFound(name.to_string()))?;
        let dtype = column.dtype();

        if dtype == &DataType::String {
            return Ok(Self::Text(column_as_strings(df, name)?));
        }
        if !is_numeric_dtype(dtype) && !is_temporal_dtype(dtype) {
            return Err(CleaningError::InvalidConfig(format!(
                "cannot order rows by '{}' of type {}",
                name, dtype
            )));
        }

        let physical = column.as_materialized_series().to_physical_repr();
        let values = physical
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .collect();
        Ok(Self::Numeric(values))
    }

    /// Ascending, nulls last.
    fn compare(&self, a: usize, b: usize) -> Ordering {
        match self {
            Self::Numeric(v) => nulls_last(v[a], v[b], |x, y| x.total_cmp(&y)),
            Self::Text(v) => nulls_last(v[a].as_deref(), v[b].as_deref(), |x, y| x.cmp(y)),
        }
    }
}

fn nulls_last<T>(a: Option<T>, b: Option<T>, cmp: impl Fn(T, T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => cmp(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Fill the nulls of one group in place. `rows` must already be in the
/// group's intra-group order. Returns how many cells were filled.
pub(crate) fn fill_group(values: &mut [Option<f64>], rows: &[usize], strategy: FillStrategy) -> usize {
    let mut filled = 0;
    match strategy {
        FillStrategy::ForwardFill => {
            let mut last = None;
            for &row in rows {
                match values[row] {
                    Some(v) => last = Some(v),
                    None if last.is_some() => {
                        values[row] = last;
                        filled += 1;
                    }
                    None => {}
                }
            }
        }
        FillStrategy::BackwardFill => {
            let mut next = None;
            for &row in rows.iter().rev() {
                match values[row] {
                    Some(v) => next = Some(v),
                    None if next.is_some() => {
                        values[row] = next;
                        filled += 1;
                    }
                    None => {}
                }
            }
        }
        FillStrategy::MedianFill => {
            let mut present: Vec<f64> = rows.iter().filter_map(|&row| values[row]).collect();
            if let Some(m) = median(&mut present) {
                for &row in rows {
                    if values[row].is_none() {
                        values[row] = Some(m);
                        filled += 1;
                    }
                }
            }
        }
    }
    filled
}

/// Applies one [`ImputationPass`] to a table.
pub struct GroupedImputer;

impl GroupedImputer {
    /// Run `pass` over `df` and return the imputed table with a report.
    ///
    /// Only the pass's target columns change. A target column with at least
    /// one filled cell comes back as Float64; one with nothing filled is left
    /// exactly as it was.
    /// Row count and row order are preserved. Cells that have no donor in
    /// their group stay null.
    pub fn impute(mut df: DataFrame, pass: &ImputationPass) -> Result<(DataFrame, PassReport)> {
        Self::validate(&df, pass)?;

        let in_scope = Self::scope_mask(&df, pass)?;
        let rows_in_scope = in_scope.iter().filter(|&&s| s).count();

        let mut partition = partition_rows(&df, &pass.group_keys, &in_scope)?;
        // A median does not depend on row order.
        if let Some(order_by) = &pass.order_by
            && pass.strategy.is_sequential()
        {
            let sort_key = SortKey::read(&df, order_by)?;
            for rows in partition.rows.iter_mut() {
                // sort_by is stable: equal keys keep table order.
                rows.sort_by(|&a, &b| sort_key.compare(a, b));
            }
        }

        debug!(
            "{}: {} group(s) over {:?}, {} row(s) in scope",
            pass.name,
            partition.len(),
            pass.group_keys,
            rows_in_scope
        );

        let mut columns = Vec::with_capacity(pass.targets.len());
        for target in &pass.targets {
            let mut values = column_as_f64(&df, target)?;
            let nulls_before = values.iter().filter(|v| v.is_none()).count();

            let mut filled = 0;
            let mut empty_groups = 0;
            for rows in &partition.rows {
                if rows.iter().all(|&row| values[row].is_none()) {
                    empty_groups += 1;
                }
                filled += fill_group(&mut values, rows, pass.strategy);
            }

            if filled > 0 {
                df.replace(target, Series::new(target.as_str().into(), values))?;
            }

            debug!(
                "{}: filled {} of {} null(s) in '{}' ({} empty group(s))",
                pass.name, filled, nulls_before, target, empty_groups
            );

            columns.push(ColumnFillStats {
                column: target.clone(),
                nulls_before,
                filled,
                nulls_after: nulls_before - filled,
                empty_groups,
            });
        }

        let report = PassReport {
            name: pass.name.clone(),
            strategy: pass.strategy,
            group_keys: pass.group_keys.clone(),
            group_count: partition.len(),
            rows_in_scope,
            columns,
        };

        info!(
            "{} ({}): filled {} value(s), {} still missing",
            pass.name,
            pass.strategy.display_name(),
            report.total_filled(),
            report.total_remaining()
        );

        Ok((df, report))
    }

    fn validate(df: &DataFrame, pass: &ImputationPass) -> Result<()> {
        if pass.group_keys.is_empty() {
            return Err(CleaningError::InvalidConfig(format!(
                "pass '{}' has no grouping keys",
                pass.name
            )));
        }
        if pass.targets.is_empty() {
            return Err(CleaningError::InvalidConfig(format!(
                "pass '{}' has no target columns",
                pass.name
            )));
        }
        for target in &pass.targets {
            if pass.group_keys.contains(target) || pass.order_by.as_ref() == Some(target) {
                return Err(CleaningError::ImputationFailed {
                    column: target.clone(),
                    reason: format!("pass '{}' also uses it as a key", pass.name),
                });
            }
        }

        ensure_columns(df, &pass.group_keys)?;
        ensure_columns(df, &pass.targets)?;
        if let Some(order_by) = &pass.order_by {
            ensure_columns(df, &[order_by])?;
        }
        if let Some(scope) = &pass.scope {
            ensure_columns(df, &[&scope.column])?;
        }
        Ok(())
    }

    fn scope_mask(df: &DataFrame, pass: &ImputationPass) -> Result<Vec<bool>> {
        match &pass.scope {
            None => Ok(vec![true; df.height()]),
            Some(scope) => Ok(column_as_strings(df, &scope.column)?
                .into_iter()
                .map(|v| v.as_deref() == Some(scope.value.as_str()))
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RowScope;

    fn targets(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
        column_as_f64(df, column).unwrap()
    }

    #[test]
    fn test_forward_fill_leaves_leading_nulls() {
        let df = df![
            "location" => ["X"; 5],
            "day" => [1i32, 2, 3, 4, 5],
            "rspm" => [None, Some(5.0), None, None, Some(8.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(
            values(&df, "rspm"),
            vec![None, Some(5.0), Some(5.0), Some(5.0), Some(8.0)]
        );
        assert_eq!(report.columns[0].filled, 2);
        assert_eq!(report.columns[0].nulls_after, 1);
    }

    #[test]
    fn test_backward_fill_completes_forward_fill() {
        let df = df![
            "location" => ["X"; 5],
            "day" => [1i32, 2, 3, 4, 5],
            "rspm" => [None, Some(5.0), Some(5.0), Some(5.0), Some(8.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("bfill", &["location"], &targets(&["rspm"]), FillStrategy::BackwardFill)
            .ordered_by("day");

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(
            values(&df, "rspm"),
            vec![Some(5.0), Some(5.0), Some(5.0), Some(5.0), Some(8.0)]
        );
    }

    #[test]
    fn test_median_fill() {
        let df = df![
            "type" => ["Industrial"; 5],
            "rspm" => [None, Some(2.0), Some(4.0), None, Some(6.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["rspm"]), FillStrategy::MedianFill);

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(
            values(&df, "rspm"),
            vec![Some(4.0), Some(2.0), Some(4.0), Some(4.0), Some(6.0)]
        );
        assert_eq!(report.total_filled(), 2);
    }

    #[test]
    fn test_all_null_group_passes_through() {
        let df = df![
            "type" => ["Sensitive", "Sensitive"],
            "rspm" => [Option::<f64>::None, None],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["rspm"]), FillStrategy::MedianFill);

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(values(&df, "rspm"), vec![None, None]);
        assert_eq!(report.columns[0].empty_groups, 1);
        assert_eq!(report.columns[0].nulls_after, 2);
    }

    #[test]
    fn test_fill_never_crosses_groups() {
        let df = df![
            "location" => ["A", "A", "B", "B"],
            "day" => [1i32, 2, 1, 2],
            "rspm" => [Some(1.0), None, None, Some(9.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();

        // B's leading null must not borrow A's value.
        assert_eq!(values(&df, "rspm"), vec![Some(1.0), Some(1.0), None, Some(9.0)]);
    }

    #[test]
    fn test_order_by_sorts_within_group() {
        // Rows arrive out of chronological order.
        let df = df![
            "location" => ["X", "X", "X"],
            "day" => [3i32, 1, 2],
            "rspm" => [None, Some(10.0), None],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(values(&df, "rspm"), vec![Some(10.0), Some(10.0), Some(10.0)]);
        let days: Vec<Option<i32>> = df
            .column("day")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(days, vec![Some(3), Some(1), Some(2)]);
    }

    #[test]
    fn test_null_order_values_sort_last() {
        let df = df![
            "location" => ["X", "X", "X"],
            "day" => [None, Some(1i32), Some(2)],
            "rspm" => [None, Some(4.0), None],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();
        assert_eq!(values(&df, "rspm"), vec![Some(4.0), Some(4.0), Some(4.0)]);
    }

    #[test]
    fn test_ties_keep_table_order() {
        let df = df![
            "location" => ["X", "X", "X"],
            "day" => [1i32, 1, 1],
            "rspm" => [Some(3.0), None, Some(7.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();
        assert_eq!(values(&df, "rspm"), vec![Some(3.0), Some(3.0), Some(7.0)]);
    }

    #[test]
    fn test_multi_column_keys() {
        let df = df![
            "state" => ["S1", "S1", "S1", "S2"],
            "type" => ["Industrial", "Industrial", "Residential", "Industrial"],
            "rspm" => [Some(2.0), None, None, Some(100.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new(
            "median",
            &["state", "type"],
            &targets(&["rspm"]),
            FillStrategy::MedianFill,
        );

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(report.group_count, 3);
        assert_eq!(values(&df, "rspm"), vec![Some(2.0), Some(2.0), None, Some(100.0)]);
    }

    #[test]
    fn test_null_keys_form_their_own_group() {
        let df = df![
            "type" => [None, None, Some("Industrial")],
            "rspm" => [Some(1.0), None, Some(50.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["rspm"]), FillStrategy::MedianFill);

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(report.group_count, 2);
        assert_eq!(values(&df, "rspm"), vec![Some(1.0), Some(1.0), Some(50.0)]);
    }

    #[test]
    fn test_scope_limits_reads_and_writes() {
        let df = df![
            "state" => ["Andhra Pradesh", "Andhra Pradesh", "Goa", "Goa"],
            "type" => ["Industrial"; 4],
            "so2" => [Some(4.0), None, Some(90.0), None],
        ]
        .unwrap();
        let pass = ImputationPass::new(
            "prefill",
            &["state", "type"],
            &targets(&["so2"]),
            FillStrategy::MedianFill,
        )
        .scoped(RowScope::new("state", "Andhra Pradesh"));

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(report.rows_in_scope, 2);
        assert_eq!(values(&df, "so2"), vec![Some(4.0), Some(4.0), Some(90.0), None]);
    }

    #[test]
    fn test_permuted_rows_give_same_values() {
        let original = df![
            "id" => [0i32, 1, 2, 3, 4, 5],
            "location" => ["A", "B", "A", "B", "A", "B"],
            "day" => [1i32, 1, 2, 2, 3, 3],
            "rspm" => [None, Some(7.0), Some(2.0), None, None, Some(1.0)],
        ]
        .unwrap();
        let permuted = df![
            "id" => [5i32, 2, 0, 4, 3, 1],
            "location" => ["B", "A", "A", "A", "B", "B"],
            "day" => [3i32, 2, 1, 3, 2, 1],
            "rspm" => [Some(1.0), Some(2.0), None, None, None, Some(7.0)],
        ]
        .unwrap();
        let pass = ImputationPass::new("ffill", &["location"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("day");

        let by_id = |df: DataFrame| {
            let (df, _) = GroupedImputer::impute(df, &pass).unwrap();
            let ids: Vec<i32> = df
                .column("id")
                .unwrap()
                .as_materialized_series()
                .i32()
                .unwrap()
                .into_iter()
                .flatten()
                .collect();
            let mut rows: Vec<(i32, Option<f64>)> =
                ids.into_iter().zip(values(&df, "rspm")).collect();
            rows.sort_by_key(|(id, _)| *id);
            rows
        };

        assert_eq!(by_id(original), by_id(permuted));
    }

    #[test]
    fn test_idempotent_when_nothing_missing() {
        let df = df![
            "type" => ["Industrial", "Industrial"],
            "rspm" => [1.0, 3.0],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["rspm"]), FillStrategy::MedianFill);

        let (once, first) = GroupedImputer::impute(df, &pass).unwrap();
        let (twice, second) = GroupedImputer::impute(once.clone(), &pass).unwrap();

        assert_eq!(first.total_filled(), 0);
        assert_eq!(second.total_filled(), 0);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_unfilled_target_keeps_its_dtype() {
        let df = df![
            "state" => ["Andhra Pradesh", "Goa", "Goa"],
            "type" => ["Industrial"; 3],
            "so2" => [Some(4i64), Some(6), None],
            "no2" => [Some(1.5), None, Some(2.5)],
        ]
        .unwrap();
        let pass = ImputationPass::new(
            "prefill",
            &["state", "type"],
            &targets(&["so2", "no2"]),
            FillStrategy::MedianFill,
        )
        .scoped(RowScope::new("state", "Andhra Pradesh"));

        let (out, report) = GroupedImputer::impute(df.clone(), &pass).unwrap();

        assert_eq!(report.total_filled(), 0);
        assert_eq!(out.column("so2").unwrap().dtype(), &DataType::Int64);
        assert!(out.equals_missing(&df));
    }

    #[test]
    fn test_filled_target_becomes_float() {
        let df = df![
            "type" => ["Industrial"; 3],
            "so2" => [Some(4i64), None, Some(6)],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["so2"]), FillStrategy::MedianFill);

        let (df, _) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(df.column("so2").unwrap().dtype(), &DataType::Float64);
        assert_eq!(values(&df, "so2"), vec![Some(4.0), Some(5.0), Some(6.0)]);
    }

    #[test]
    fn test_empty_text_target_passes_through() {
        let df = df![
            "type" => ["Industrial", "Sensitive"],
            "spm" => [Option::<&str>::None, None],
        ]
        .unwrap();
        let pass = ImputationPass::new("median", &["type"], &targets(&["spm"]), FillStrategy::MedianFill);

        let (df, report) = GroupedImputer::impute(df, &pass).unwrap();

        assert_eq!(report.columns[0].nulls_after, 2);
        assert_eq!(report.columns[0].empty_groups, 2);
        assert_eq!(values(&df, "spm"), vec![None, None]);
    }

    #[test]
    fn test_order_column_only_read_by_sequential_fills() {
        let df = df![
            "type" => ["Industrial"; 3],
            "flag" => [true, false, true],
            "rspm" => [Some(2.0), None, Some(4.0)],
        ]
        .unwrap();

        let median = ImputationPass::new("median", &["type"], &targets(&["rspm"]), FillStrategy::MedianFill)
            .ordered_by("flag");
        let (out, _) = GroupedImputer::impute(df.clone(), &median).unwrap();
        assert_eq!(values(&out, "rspm"), vec![Some(2.0), Some(3.0), Some(4.0)]);

        let ffill = ImputationPass::new("ffill", &["type"], &targets(&["rspm"]), FillStrategy::ForwardFill)
            .ordered_by("flag");
        let err = GroupedImputer::impute(df, &ffill).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_missing_and_overlapping_columns() {
        let df = df![
            "type" => ["Industrial"],
            "rspm" => [1.0],
        ]
        .unwrap();

        let missing = ImputationPass::new("m", &["type"], &targets(&["spm"]), FillStrategy::MedianFill);
        let err = GroupedImputer::impute(df.clone(), &missing).unwrap_err();
        assert!(matches!(err, CleaningError::ColumnNotFound(c) if c == "spm"));

        let overlap = ImputationPass::new("m", &["type"], &targets(&["type"]), FillStrategy::MedianFill);
        let err = GroupedImputer::impute(df.clone(), &overlap).unwrap_err();
        assert_eq!(err.error_code(), "IMPUTATION_FAILED");

        let no_keys = ImputationPass::new("m", &[], &targets(&["rspm"]), FillStrategy::MedianFill);
        let err = GroupedImputer::impute(df, &no_keys).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
