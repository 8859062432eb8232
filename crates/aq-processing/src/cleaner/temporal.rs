//! Date parsing and year derivation.

use crate::error::{CleaningError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::{debug, warn};

/// `NaiveDate::num_days_from_ce()` of 1970-01-01, the epoch polars counts
/// `Date` values from.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Counts from one temporal derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemporalReport {
    /// Rows whose date was null or could not be parsed; their year was
    /// taken from a preceding row.
    pub unparseable: usize,
}

/// Parses the date column into calendar dates and derives an integer year.
pub struct TemporalDeriver {
    formats: Vec<String>,
}

impl TemporalDeriver {
    pub fn new(formats: Vec<String>) -> Self {
        Self { formats }
    }

    /// Parse a single date string with the configured formats.
    pub fn parse_date(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        self.formats.iter().find_map(|fmt| {
            NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .or_else(|| NaiveDateTime::parse_from_str(raw, fmt).ok().map(|dt| dt.date()))
        })
    }

    /// Replace `date_column` with a typed `Date` column (null where parsing
    /// failed) and write `year_column` as Int64.
    ///
    /// Missing years are forward-filled in table order. Fails with
    /// [`CleaningError::UnresolvedYear`] when leading rows have no year to
    /// inherit.
    pub fn derive(
        &self,
        mut df: DataFrame,
        date_column: &str,
        year_column: &str,
    ) -> Result<(DataFrame, TemporalReport)> {
        let dates = self.read_dates(&df, date_column)?;
        let unparseable = dates.iter().filter(|d| d.is_none()).count();
        if unparseable > 0 {
            warn!(
                "{} of {} value(s) in '{}' could not be parsed as dates",
                unparseable,
                dates.len(),
                date_column
            );
        }

        let days: Vec<Option<i32>> = dates
            .iter()
            .map(|d| d.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
            .collect();
        let date_series = Series::new(date_column.into(), days).cast(&DataType::Date)?;
        df.replace(date_column, date_series)?;

        let years: Vec<Option<i64>> = dates.iter().map(|d| d.map(|d| d.year() as i64)).collect();
        let year_series = Series::new(year_column.into(), years)
            .fill_null(FillNullStrategy::Forward(None))?;

        let remaining = year_series.null_count();
        if remaining > 0 {
            return Err(CleaningError::UnresolvedYear { rows: remaining });
        }
        let year_series = year_series.strict_cast(&DataType::Int64)?;

        if df.column(year_column).is_ok() {
            df.replace(year_column, year_series)?;
        } else {
            df.with_column(year_series)?;
        }

        debug!("Derived '{}' from '{}'", year_column, date_column);
        Ok((df, TemporalReport { unparseable }))
    }

    fn read_dates(&self, df: &DataFrame, date_column: &str) -> Result<Vec<Option<NaiveDate>>> {
        let column = df
            .column(date_column)
            .map_err(|_| CleaningError::ColumnNotFound(date_column.to_string()))?;

        match column.dtype() {
            DataType::String => Ok(column
                .as_materialized_series()
                .str()?
                .into_iter()
                .map(|raw| raw.and_then(|raw| self.parse_date(raw)))
                .collect()),
            DataType::Date | DataType::Datetime(_, _) => {
                let days = column.cast(&DataType::Date)?.cast(&DataType::Int32)?;
                Ok(days
                    .as_materialized_series()
                    .i32()?
                    .into_iter()
                    .map(|d| {
                        d.and_then(|d| {
                            NaiveDate::from_num_days_from_ce_opt(d + UNIX_EPOCH_DAYS_FROM_CE)
                        })
                    })
                    .collect())
            }
            DataType::Null => Ok(vec![None; column.len()]),
            other => Err(CleaningError::TypeConversionFailed {
                column: date_column.to_string(),
                target_type: "Date".to_string(),
                reason: format!("cannot parse dates from {}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn deriver() -> TemporalDeriver {
        TemporalDeriver::new(PipelineConfig::default().date_formats)
    }

    fn years(df: &DataFrame) -> Vec<Option<i64>> {
        df.column("year")
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn date_strings(df: &DataFrame) -> Vec<Option<String>> {
        df.column("date")
            .unwrap()
            .cast(&DataType::String)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn test_parse_date_formats() {
        let d = deriver();
        let expected = NaiveDate::from_ymd_opt(2015, 3, 1);
        assert_eq!(d.parse_date("2015-03-01"), expected);
        assert_eq!(d.parse_date(" 2015/03/01 "), expected);
        assert_eq!(d.parse_date("01-03-2015"), expected);
        assert_eq!(d.parse_date("2015-03-01 10:30:00"), expected);
        assert_eq!(d.parse_date(""), None);
        assert_eq!(d.parse_date("March - M031990"), None);
    }

    #[test]
    fn test_derive_year_from_text_dates() {
        let df = df![
            "date" => ["1990-02-01", "1991-07-15", "2015-12-31"],
        ]
        .unwrap();

        let (df, report) = deriver().derive(df, "date", "year").unwrap();

        assert_eq!(report.unparseable, 0);
        assert_eq!(years(&df), vec![Some(1990), Some(1991), Some(2015)]);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
        assert_eq!(date_strings(&df)[1].as_deref(), Some("1991-07-15"));
    }

    #[test]
    fn test_unparseable_dates_forward_fill_year() {
        let df = df![
            "date" => [Some("2004-05-01"), Some("not a date"), None, Some("2006-01-09")],
        ]
        .unwrap();

        let (df, report) = deriver().derive(df, "date", "year").unwrap();

        assert_eq!(report.unparseable, 2);
        assert_eq!(years(&df), vec![Some(2004), Some(2004), Some(2004), Some(2006)]);
        // The date itself stays null; only the year is carried forward.
        assert_eq!(df.column("date").unwrap().null_count(), 2);
    }

    #[test]
    fn test_leading_unparseable_date_is_fatal() {
        let df = df![
            "date" => ["garbage", "2010-01-01"],
        ]
        .unwrap();

        let err = deriver().derive(df, "date", "year").unwrap_err();
        assert!(matches!(err, CleaningError::UnresolvedYear { rows: 1 }));
    }

    #[test]
    fn test_existing_year_column_is_overwritten() {
        let df = df![
            "date" => ["2001-01-01", "2002-01-01"],
            "year" => [Some(1900i64), None],
        ]
        .unwrap();

        let (df, _) = deriver().derive(df, "date", "year").unwrap();
        assert_eq!(df.width(), 2);
        assert_eq!(years(&df), vec![Some(2001), Some(2002)]);
    }

    #[test]
    fn test_typed_date_column_is_kept() {
        let days = Series::new("date".into(), [Some(0i32), Some(365)])
            .cast(&DataType::Date)
            .unwrap();
        let df = DataFrame::new(vec![days.into()]).unwrap();

        let (df, report) = deriver().derive(df, "date", "year").unwrap();

        assert_eq!(report.unparseable, 0);
        assert_eq!(years(&df), vec![Some(1970), Some(1971)]);
    }

    #[test]
    fn test_row_count_preserved() {
        let df = df![
            "date" => ["2001-01-01", "bad", "2002-01-01"],
            "rspm" => [Some(1.0), None, Some(3.0)],
        ]
        .unwrap();

        let (out, _) = deriver().derive(df.clone(), "date", "year").unwrap();
        assert_eq!(out.height(), df.height());
        assert!(
            out.column("rspm")
                .unwrap()
                .as_materialized_series()
                .equals_missing(df.column("rspm").unwrap().as_materialized_series())
        );
    }
}
