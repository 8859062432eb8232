//! Main cleaning pipeline module.
//!
//! This module provides the `Pipeline` struct and builder that run the
//! fixed sequence of normalization, date derivation and grouped imputation.

use crate::cleaner::{CategoryNormalizer, SchemaFinalizer, TemporalDeriver};
use crate::config::PipelineConfig;
use crate::error::{Result, ResultExt};
use crate::imputers::GroupedImputer;
use crate::pipeline::progress::{
    ClosureProgressReporter, PipelineStage, ProgressReporter, ProgressUpdate,
};
use crate::types::{CleaningSummary, FillStrategy, ImputationPass, PipelineResult, RowScope};
use crate::utils::{ensure_columns, null_counts};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The air-quality cleaning pipeline.
///
/// Use [`Pipeline::builder()`] to create a pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use aq_processing::{Pipeline, PipelineConfig};
///
/// let result = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .process(dataframe)?;
///
/// println!("{} value(s) still missing", result.summary.residual_nulls.len());
/// ```
pub struct Pipeline {
    config: PipelineConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    temporal: TemporalDeriver,
}

// Pipeline can be moved to a worker thread.
static_assertions::assert_impl_all!(Pipeline: Send);

/// The four fallback passes, from finest to coarsest grouping.
///
/// Each pass consumes the full output of the one before it.
pub fn imputation_passes(config: &PipelineConfig) -> Vec<ImputationPass> {
    let targets = &config.pollutant_columns;
    let location = config.location_column.as_str();
    let state = config.state_column.as_str();
    let area = config.type_column.as_str();

    vec![
        ImputationPass::new(
            "location_forward",
            &[location, area],
            targets,
            FillStrategy::ForwardFill,
        )
        .ordered_by(&config.date_column),
        ImputationPass::new(
            "location_backward",
            &[location, area],
            targets,
            FillStrategy::BackwardFill,
        )
        .ordered_by(&config.date_column),
        ImputationPass::new("state_median", &[state, area], targets, FillStrategy::MedianFill),
        ImputationPass::new("type_median", &[area], targets, FillStrategy::MedianFill),
    ]
}

/// The single-state so2/no2 prefill, or `None` when it is disabled.
pub fn prefill_pass(config: &PipelineConfig) -> Option<ImputationPass> {
    let state_value = config.prefill_state.as_ref()?;
    Some(
        ImputationPass::new(
            "prefill",
            &[config.state_column.as_str(), config.type_column.as_str()],
            &config.prefill_columns,
            FillStrategy::MedianFill,
        )
        .scoped(RowScope::new(&config.state_column, state_value)),
    )
}

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the full cleaning sequence over `df`.
    ///
    /// Returns the finalized table and a summary of what each stage did.
    /// Rows are never added, removed or reordered.
    pub fn process(&self, df: DataFrame) -> Result<PipelineResult> {
        match self.process_internal(df) {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete("Pipeline completed successfully"));
                Ok(result)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn process_internal(&self, df: DataFrame) -> Result<PipelineResult> {
        let start_time = Instant::now();
        let config = &self.config;

        info!("Starting cleaning pipeline...");
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Initializing,
            0.0,
            "Checking required columns...",
        ));

        let mut summary = CleaningSummary::new();
        summary.rows_before = df.height();
        summary.columns_before = df.width();

        ensure_columns(&df, &config.required_columns())?;

        // Step 1: Relabel categories
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Normalizing,
            0.0,
            "Normalizing category labels...",
        ));
        info!("Step 1: Normalizing category labels...");

        let mut df = df;
        for (column, mapping) in [
            (&config.type_column, &config.type_labels),
            (&config.state_column, &config.state_labels),
        ] {
            let (normalized, relabelled) = CategoryNormalizer::normalize(df, column, mapping)
                .context(format!("normalizing '{}'", column))?;
            debug!("Relabelled {} cell(s) in '{}'", relabelled, column);
            summary.relabelled_cells.insert(column.clone(), relabelled);
            df = normalized;
        }

        // Step 2: Dates and year
        self.report_progress(ProgressUpdate::new(
            PipelineStage::TemporalDerivation,
            0.0,
            "Parsing dates...",
        ));
        info!("Step 2: Deriving '{}' from '{}'...", config.year_column, config.date_column);

        let (df, temporal) =
            self.temporal
                .derive(df, &config.date_column, &config.year_column)?;
        summary.unparseable_dates = temporal.unparseable;

        // Step 3: Targeted prefill
        let df = match prefill_pass(config) {
            Some(pass) => {
                self.report_progress(ProgressUpdate::new(
                    PipelineStage::Prefill,
                    0.0,
                    format!("Prefilling {:?} from state medians...", pass.targets),
                ));
                info!("Step 3: Prefilling {:?}...", pass.targets);

                let (df, report) = GroupedImputer::impute(df, &pass).context("prefill")?;
                summary.prefill = Some(report);
                df
            }
            None => {
                info!("Step 3: Skipping prefill (no state configured)");
                df
            }
        };

        // Step 4: Fallback passes
        info!("Step 4: Running imputation passes...");
        let passes = imputation_passes(config);
        let total = passes.len();
        let mut df = df;
        for (i, pass) in passes.iter().enumerate() {
            self.report_progress(ProgressUpdate::with_step(
                PipelineStage::Imputation,
                i + 1,
                total,
                format!(
                    "{} by {:?}",
                    pass.strategy.display_name(),
                    pass.group_keys
                ),
            ));

            let (imputed, report) = GroupedImputer::impute(df, pass)
                .context(format!("imputation pass '{}'", pass.name))?;
            summary.passes.push(report);
            df = imputed;
        }

        for (column, remaining) in null_counts(&df, &config.pollutant_columns)? {
            if remaining > 0 {
                warn!(
                    "'{}' still has {} missing value(s) after all passes",
                    column, remaining
                );
            }
            summary.residual_nulls.insert(column, remaining);
        }

        // Step 5: Drop administrative columns
        self.report_progress(ProgressUpdate::new(
            PipelineStage::Finalizing,
            0.0,
            "Dropping administrative columns...",
        ));
        info!("Step 5: Finalizing schema...");

        let (df, dropped) = SchemaFinalizer::finalize(df, &config.dropped_columns);
        summary.dropped_columns = dropped;

        summary.rows_after = df.height();
        summary.columns_after = df.width();
        summary.duration_ms = start_time.elapsed().as_millis() as u64;

        info!(
            "Cleaned {} row(s) in {} ms ({} column(s) dropped)",
            summary.rows_after,
            summary.duration_ms,
            summary.dropped_columns.len()
        );

        Ok(PipelineResult { data: df, summary })
    }
}

/// Builder for creating a [`Pipeline`] instance.
///
/// Use [`Pipeline::builder()`] to get started.
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during processing.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use aq_processing::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct StageLogger;
    ///
    /// impl ProgressReporter for StageLogger {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let pipeline = Pipeline::builder()
    ///     .progress_reporter(Arc::new(StageLogger))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the pipeline.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<Pipeline, crate::config::ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let temporal = TemporalDeriver::new(config.date_formats.clone());

        Ok(Pipeline {
            config,
            progress_reporter: self.progress_reporter,
            temporal,
        })
    }
}
