//! Configuration types for the cleaning pipeline.
//!
//! The pipeline itself is fixed; configuration only names the columns it
//! works on, the label mappings, and where output goes. Defaults match the
//! Indian ambient air-quality dataset layout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Raw `type` labels and the canonical area category they collapse to.
pub const DEFAULT_TYPE_LABELS: [(&str, &str); 6] = [
    ("Residential, Rural and other Areas", "Residential"),
    ("Residential and others", "Residential"),
    ("Industrial Areas", "Industrial"),
    ("Industrial Area", "Industrial"),
    ("Sensitive Area", "Sensitive"),
    ("Sensitive Areas", "Sensitive"),
];

pub const DEFAULT_STATE_LABELS: [(&str, &str); 1] =
    [("andaman-and-nicobar-islands", "Andaman and Nicobar Islands")];

/// Tried in order; the first that parses wins.
pub const DEFAULT_DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

pub const DEFAULT_DROPPED_COLUMNS: [&str; 5] = [
    "index",
    "stn_code",
    "sampling_date",
    "agency",
    "location_monitoring_station",
];

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to override individual fields.
///
/// # Example
///
/// ```rust,ignore
/// use aq_processing::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .output_dir("cleaned")
///     .prefill_state(None::<String>)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default: "state"
    pub state_column: String,
    /// Default: "location"
    pub location_column: String,
    /// Area category column. Default: "type"
    pub type_column: String,
    /// Default: "date"
    pub date_column: String,
    /// Derived column, overwritten if present. Default: "year"
    pub year_column: String,

    /// Columns imputed by the four fallback passes.
    /// Default: ["rspm", "spm"]
    pub pollutant_columns: Vec<String>,

    /// Exact-match relabelling for the type column.
    pub type_labels: BTreeMap<String, String>,
    /// Exact-match relabelling for the state column.
    pub state_labels: BTreeMap<String, String>,

    /// chrono format strings for text dates.
    pub date_formats: Vec<String>,

    /// State whose (state, type) medians prefill `prefill_columns` before
    /// the general passes. `None` skips the prefill.
    /// Default: Some("Andhra Pradesh")
    pub prefill_state: Option<String>,
    /// Default: ["so2", "no2"]
    pub prefill_columns: Vec<String>,

    /// Columns removed from the final table if present.
    pub dropped_columns: Vec<String>,

    /// Default: "outputs"
    pub output_dir: PathBuf,
    /// Output file stem (without extension).
    /// Default: "air_quality_cleaned_data"
    pub output_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_column: "state".to_string(),
            location_column: "location".to_string(),
            type_column: "type".to_string(),
            date_column: "date".to_string(),
            year_column: "year".to_string(),
            pollutant_columns: vec!["rspm".to_string(), "spm".to_string()],
            type_labels: to_label_map(&DEFAULT_TYPE_LABELS),
            state_labels: to_label_map(&DEFAULT_STATE_LABELS),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            prefill_state: Some("Andhra Pradesh".to_string()),
            prefill_columns: vec!["so2".to_string(), "no2".to_string()],
            dropped_columns: DEFAULT_DROPPED_COLUMNS
                .iter()
                .map(|c| c.to_string())
                .collect(),
            output_dir: PathBuf::from("outputs"),
            output_name: "air_quality_cleaned_data".to_string(),
        }
    }
}

fn to_label_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(raw, canonical)| (raw.to_string(), canonical.to_string()))
        .collect()
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::CleaningError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Columns every input table must carry.
    pub fn required_columns(&self) -> Vec<&str> {
        let mut cols = vec![
            self.state_column.as_str(),
            self.location_column.as_str(),
            self.type_column.as_str(),
            self.date_column.as_str(),
        ];
        cols.extend(self.pollutant_columns.iter().map(String::as_str));
        if self.prefill_state.is_some() {
            cols.extend(self.prefill_columns.iter().map(String::as_str));
        }
        cols
    }

    /// Path of the cleaned CSV inside `output_dir`.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", self.output_name))
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let named = [
            ("state_column", &self.state_column),
            ("location_column", &self.location_column),
            ("type_column", &self.type_column),
            ("date_column", &self.date_column),
            ("year_column", &self.year_column),
            ("output_name", &self.output_name),
        ];
        for (field, value) in named {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyField(field.to_string()));
            }
        }

        if self.pollutant_columns.is_empty() {
            return Err(ConfigValidationError::EmptyField(
                "pollutant_columns".to_string(),
            ));
        }

        if self.date_formats.is_empty() {
            return Err(ConfigValidationError::EmptyField("date_formats".to_string()));
        }

        if self.prefill_state.is_some() && self.prefill_columns.is_empty() {
            return Err(ConfigValidationError::EmptyField(
                "prefill_columns".to_string(),
            ));
        }

        let keys = [
            &self.state_column,
            &self.location_column,
            &self.type_column,
            &self.date_column,
        ];
        for target in self.pollutant_columns.iter().chain(&self.prefill_columns) {
            if keys.contains(&target) {
                return Err(ConfigValidationError::TargetIsKey(target.clone()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Configuration field '{0}' must not be empty")]
    EmptyField(String),

    #[error("Column '{0}' cannot be both an imputation target and a grouping/ordering key")]
    TargetIsKey(String),
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    state_column: Option<String>,
    location_column: Option<String>,
    type_column: Option<String>,
    date_column: Option<String>,
    year_column: Option<String>,
    pollutant_columns: Option<Vec<String>>,
    type_labels: Option<BTreeMap<String, String>>,
    state_labels: Option<BTreeMap<String, String>>,
    date_formats: Option<Vec<String>>,
    prefill_state: Option<Option<String>>,
    prefill_columns: Option<Vec<String>>,
    dropped_columns: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
}

impl PipelineConfigBuilder {
    pub fn state_column(mut self, name: impl Into<String>) -> Self {
        self.state_column = Some(name.into());
        self
    }

    pub fn location_column(mut self, name: impl Into<String>) -> Self {
        self.location_column = Some(name.into());
        self
    }

    pub fn type_column(mut self, name: impl Into<String>) -> Self {
        self.type_column = Some(name.into());
        self
    }

    pub fn date_column(mut self, name: impl Into<String>) -> Self {
        self.date_column = Some(name.into());
        self
    }

    pub fn year_column(mut self, name: impl Into<String>) -> Self {
        self.year_column = Some(name.into());
        self
    }

    /// Set the columns imputed by the four fallback passes.
    pub fn pollutant_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pollutant_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Add (or replace) one raw → canonical mapping for the type column.
    pub fn type_label(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.type_labels
            .get_or_insert_with(|| to_label_map(&DEFAULT_TYPE_LABELS))
            .insert(raw.into(), canonical.into());
        self
    }

    /// Add (or replace) one raw → canonical mapping for the state column.
    pub fn state_label(mut self, raw: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.state_labels
            .get_or_insert_with(|| to_label_map(&DEFAULT_STATE_LABELS))
            .insert(raw.into(), canonical.into());
        self
    }

    pub fn date_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_formats = Some(formats.into_iter().map(Into::into).collect());
        self
    }

    /// Set the state used for the so2/no2 prefill, or `None` to skip it.
    pub fn prefill_state<S: Into<String>>(mut self, state: Option<S>) -> Self {
        self.prefill_state = Some(state.map(Into::into));
        self
    }

    pub fn prefill_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefill_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn dropped_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dropped_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            state_column: self.state_column.unwrap_or(defaults.state_column),
            location_column: self.location_column.unwrap_or(defaults.location_column),
            type_column: self.type_column.unwrap_or(defaults.type_column),
            date_column: self.date_column.unwrap_or(defaults.date_column),
            year_column: self.year_column.unwrap_or(defaults.year_column),
            pollutant_columns: self.pollutant_columns.unwrap_or(defaults.pollutant_columns),
            type_labels: self.type_labels.unwrap_or(defaults.type_labels),
            state_labels: self.state_labels.unwrap_or(defaults.state_labels),
            date_formats: self.date_formats.unwrap_or(defaults.date_formats),
            prefill_state: self.prefill_state.unwrap_or(defaults.prefill_state),
            prefill_columns: self.prefill_columns.unwrap_or(defaults.prefill_columns),
            dropped_columns: self.dropped_columns.unwrap_or(defaults.dropped_columns),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            output_name: self.output_name.unwrap_or(defaults.output_name),
        };

        config.validate()?;
        Ok(config)
    }
}
