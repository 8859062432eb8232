//! CSV loading and writing.
//!
//! Thin wrappers around polars' CSV reader and writer. They make no
//! cleaning decisions of their own.

use crate::error::{CleaningError, Result, ResultExt};
use crate::types::CleaningSummary;
use polars::io::csv::read::{CsvEncoding, CsvParseOptions, CsvReadOptions};
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Load a CSV file with a header row.
///
/// Invalid UTF-8 sequences are replaced rather than rejected, and the whole
/// file is scanned before column types are fixed.
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CleaningError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input file not found: {}", path.display()),
        )));
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .with_parse_options(
            CsvParseOptions::default()
                .with_quote_char(Some(b'"'))
                .with_encoding(CsvEncoding::LossyUtf8),
        )
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("opening {}", path.display()))?
        .finish()
        .context(format!("reading {}", path.display()))?;

    debug!(
        "Loaded {} row(s) x {} column(s) from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Write `df` as CSV with a header and no index column, creating the
/// parent directory if needed.
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)
        .context(format!("writing {}", path.display()))?;

    info!("Dataset saved: {}", path.display());
    Ok(())
}

/// Write the run summary as pretty-printed JSON.
pub fn write_report(summary: &CleaningSummary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;

    let mut file = File::create(path)?;
    file.write_all(serde_json::to_string_pretty(summary)?.as_bytes())?;

    info!("Report saved: {}", path.display());
    Ok(())
}

/// Path of the JSON report that sits next to `<output_name>.csv`.
pub fn report_path(output_dir: impl AsRef<Path>, output_name: &str) -> PathBuf {
    output_dir
        .as_ref()
        .join(format!("{}_report.json", output_name))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
        debug!("Created output directory: {}", parent.display());
    }
    Ok(())
}
