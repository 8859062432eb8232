use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a pass fills nulls inside one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// Carry the nearest preceding non-null value forward.
    ForwardFill,
    /// Carry the nearest following non-null value backward.
    BackwardFill,
    /// Substitute the group's median of non-null values.
    MedianFill,
}

impl FillStrategy {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ForwardFill => "forward fill",
            Self::BackwardFill => "backward fill",
            Self::MedianFill => "median fill",
        }
    }

    /// Whether the strategy depends on the order of rows within a group.
    pub fn is_sequential(&self) -> bool {
        matches!(self, Self::ForwardFill | Self::BackwardFill)
    }
}

/// Restricts a pass to rows where `column == value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowScope {
    pub column: String,
    pub value: String,
}

impl RowScope {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// One application of the grouped imputer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImputationPass {
    pub name: String,
    pub group_keys: Vec<String>,
    pub targets: Vec<String>,
    pub strategy: FillStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<RowScope>,
}

impl ImputationPass {
    pub fn new(
        name: impl Into<String>,
        group_keys: &[&str],
        targets: &[String],
        strategy: FillStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            group_keys: group_keys.iter().map(|k| k.to_string()).collect(),
            targets: targets.to_vec(),
            strategy,
            order_by: None,
            scope: None,
        }
    }

    pub fn ordered_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn scoped(mut self, scope: RowScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// Fill counts for one target column of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFillStats {
    pub column: String,
    pub nulls_before: usize,
    pub filled: usize,
    pub nulls_after: usize,
    /// Groups (within scope) with no non-null value for this column.
    pub empty_groups: usize,
}

/// Outcome of one imputation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub name: String,
    pub strategy: FillStrategy,
    pub group_keys: Vec<String>,
    pub group_count: usize,
    /// Rows the pass was allowed to touch.
    pub rows_in_scope: usize,
    pub columns: Vec<ColumnFillStats>,
}

impl PassReport {
    pub fn total_filled(&self) -> usize {
        self.columns.iter().map(|c| c.filled).sum()
    }

    pub fn total_remaining(&self) -> usize {
        self.columns.iter().map(|c| c.nulls_after).sum()
    }
}

/// Serializable account of what a pipeline run did.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningSummary {
    pub duration_ms: u64,

    pub rows_before: usize,
    pub rows_after: usize,
    pub columns_before: usize,
    pub columns_after: usize,

    /// Cells rewritten by label normalization, keyed by column.
    pub relabelled_cells: BTreeMap<String, usize>,
    /// Dates that failed to parse and had their year forward-filled.
    pub unparseable_dates: usize,

    pub prefill: Option<PassReport>,
    pub passes: Vec<PassReport>,

    /// Nulls left in each pollutant column after the last pass.
    pub residual_nulls: BTreeMap<String, usize>,
    pub dropped_columns: Vec<String>,
}

impl CleaningSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when every target column was fully imputed.
    pub fn is_fully_imputed(&self) -> bool {
        self.residual_nulls.values().all(|&n| n == 0)
    }
}

/// Final table plus summary, returned by [`crate::Pipeline::process`].
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub data: DataFrame,
    pub summary: CleaningSummary,
}
