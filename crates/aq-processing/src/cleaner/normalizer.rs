//! Exact-string relabelling of categorical columns.

use crate::error::{CleaningError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Rewrites raw category labels to their canonical spelling.
pub struct CategoryNormalizer;

impl CategoryNormalizer {
    /// Replace every value of `column` found in `mapping` with its canonical
    /// label. Unmapped labels and nulls pass through unchanged.
    ///
    /// Returns the new table and the number of cells rewritten.
    pub fn normalize(
        mut df: DataFrame,
        column: &str,
        mapping: &BTreeMap<String, String>,
    ) -> Result<(DataFrame, usize)> {
        let series = df
            .column(column)
            .map_err(|_| CleaningError::ColumnNotFound(column.to_string()))?
            .as_materialized_series()
            .clone();

        match series.dtype() {
            DataType::String => {}
            // An all-null column has nothing to relabel.
            DataType::Null => return Ok((df, 0)),
            other => {
                return Err(CleaningError::TypeConversionFailed {
                    column: column.to_string(),
                    target_type: "String".to_string(),
                    reason: format!("labels must be text, found {}", other),
                });
            }
        }

        if mapping.is_empty() {
            return Ok((df, 0));
        }

        let mut relabelled = 0usize;
        let values: Vec<Option<String>> = series
            .str()?
            .into_iter()
            .map(|value| {
                value.map(|raw| match mapping.get(raw) {
                    Some(canonical) if canonical != raw => {
                        relabelled += 1;
                        canonical.clone()
                    }
                    _ => raw.to_string(),
                })
            })
            .collect();

        if relabelled > 0 {
            df.replace(column, Series::new(column.into(), values))?;
        }

        debug!("Relabelled {} cell(s) in '{}'", relabelled, column);
        Ok((df, relabelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn labels(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        df.column(column)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn test_normalize_type_labels() {
        let df = df![
            "type" => [
                Some("Industrial Areas"),
                Some("Residential, Rural and other Areas"),
                Some("Sensitive Area"),
                Some("Industrial"),
                None,
            ],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        let (df, relabelled) =
            CategoryNormalizer::normalize(df, "type", &config.type_labels).unwrap();

        assert_eq!(relabelled, 3);
        assert_eq!(
            labels(&df, "type"),
            vec![
                Some("Industrial".to_string()),
                Some("Residential".to_string()),
                Some("Sensitive".to_string()),
                Some("Industrial".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_unknown_labels_pass_through() {
        let df = df![
            "type" => ["RIRUO", "Industrial Area"],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        let (df, relabelled) =
            CategoryNormalizer::normalize(df, "type", &config.type_labels).unwrap();

        assert_eq!(relabelled, 1);
        assert_eq!(labels(&df, "type")[0].as_deref(), Some("RIRUO"));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let df = df![
            "state" => ["andaman-and-nicobar-islands", "Goa", "Andaman and Nicobar Islands"],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        let (once, first) =
            CategoryNormalizer::normalize(df, "state", &config.state_labels).unwrap();
        let (twice, second) =
            CategoryNormalizer::normalize(once.clone(), "state", &config.state_labels).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 0);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_other_columns_untouched() {
        let df = df![
            "type" => ["Sensitive Areas", "Industrial"],
            "rspm" => [Some(1.5), None],
        ]
        .unwrap();
        let config = PipelineConfig::default();

        let (out, _) = CategoryNormalizer::normalize(df.clone(), "type", &config.type_labels).unwrap();

        assert_eq!(out.height(), 2);
        assert!(
            out.column("rspm")
                .unwrap()
                .as_materialized_series()
                .equals_missing(df.column("rspm").unwrap().as_materialized_series())
        );
    }

    #[test]
    fn test_missing_column() {
        let df = df![
            "state" => ["Goa"],
        ]
        .unwrap();
        let err = CategoryNormalizer::normalize(df, "type", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, CleaningError::ColumnNotFound(c) if c == "type"));
    }

    #[test]
    fn test_non_text_column_rejected() {
        let df = df![
            "type" => [1i64, 2],
        ]
        .unwrap();
        let config = PipelineConfig::default();
        let err = CategoryNormalizer::normalize(df, "type", &config.type_labels).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }
}
