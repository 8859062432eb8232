//! CLI entry point for the air-quality cleaning pipeline.

use anyhow::{Context, Result, anyhow};
use aq_processing::io::{load_csv, report_path, write_csv, write_report};
use aq_processing::profiler::DataProfiler;
use aq_processing::{CleaningSummary, Pipeline, PipelineConfig, imputation_passes};
use clap::Parser;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Air-quality missing-value cleaning pipeline",
    long_about = "Cleans a station air-quality CSV: normalizes area and state labels, \
                  derives the year from the sampling date, fills missing pollutant \
                  readings through progressively coarser groupings, and drops \
                  administrative columns.\n\n\
                  EXAMPLES:\n  \
                  # Clean with defaults, writing outputs/air_quality_cleaned_data.csv\n  \
                  aq-processing -i data.csv\n\n  \
                  # Preview missing values and grouping without imputing\n  \
                  aq-processing -i data.csv --dry-run\n\n  \
                  # Override column names or labels from a JSON file\n  \
                  aq-processing -i data.csv -c config.json -r"
)]
struct Args {
    /// Path to the CSV file to process
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for results [default: ./outputs]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name (without extension) [default: air_quality_cleaned_data]
    #[arg(long)]
    output_name: Option<String>,

    /// JSON file with pipeline configuration overrides
    ///
    /// Fields left out keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Show the missing-value profile and grouping stats without processing
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Print the run summary as JSON on stdout
    ///
    /// Disables all logs so stdout only carries the JSON document.
    #[arg(long)]
    json: bool,

    /// Write the run summary to <output-name>_report.json in the output directory
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so that stdout only
/// carries the JSON summary.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    let config = build_config(&args)?;

    info!("Loading dataset from: {}", args.input.display());
    let data = load_csv(&args.input)
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    if args.dry_run {
        return run_dry_run(&args, &config, &data);
    }

    let mut builder = Pipeline::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let pipeline = builder.build()?;

    run_pipeline(&pipeline, &args, data)
}

/// Merge the optional JSON config file with command-line overrides.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_json_file(path)
                .with_context(|| format!("invalid configuration file {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if let Some(name) = &args.output_name {
        config.output_name = name.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Run the pipeline, write the cleaned table, and print the outcome.
fn run_pipeline(pipeline: &Pipeline, args: &Args, data: DataFrame) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting air-quality cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let result = pipeline.process(data).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    let config = pipeline.config();
    let output_path = config.output_path();
    let mut cleaned = result.data;
    write_csv(&mut cleaned, &output_path)?;

    if args.emit_report {
        write_report(
            &result.summary,
            report_path(&config.output_dir, &config.output_name),
        )?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.summary)?);
        return Ok(());
    }

    print_human_readable_summary(&result.summary, args, &output_path);
    Ok(())
}

/// Print what the pipeline would work on, without imputing anything.
///
/// Uses `println!` on purpose: the preview is the command's output, not a log.
fn run_dry_run(args: &Args, config: &PipelineConfig, data: &DataFrame) -> Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Preview of cleaning actions");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", args.input.display());
    println!("  Rows: {}", data.height());
    println!("  Columns: {}", data.width());
    println!();

    println!("MISSING VALUES");
    println!("{}", "-".repeat(40));
    println!("{:<32} {:<10} {:<10} {:<10}", "Column", "Type", "Missing", "Missing %");
    println!("{}", "-".repeat(66));
    for col in DataProfiler::missing_proportions(data) {
        println!(
            "{:<32} {:<10} {:<10} {:<10.1}",
            truncate_str(&col.name, 31),
            truncate_str(&col.dtype, 9),
            col.null_count,
            col.null_proportion * 100.0
        );
    }
    println!();

    println!("AREA TYPE LABELS ('{}')", config.type_column);
    println!("{}", "-".repeat(40));
    match DataProfiler::category_counts(data, &config.type_column) {
        Ok(counts) => {
            for count in counts {
                let label = count.label.as_deref().unwrap_or("<missing>");
                let target = count
                    .label
                    .as_ref()
                    .and_then(|l| config.type_labels.get(l))
                    .map(|c| format!(" -> {}", c))
                    .unwrap_or_default();
                println!("  {:<40} {:>8}{}", label, count.count, target);
            }
        }
        Err(e) => println!("  Unavailable: {}", e),
    }
    println!();

    // Groups are taken before label normalization, so they can be finer
    // than the ones the real run sees.
    if let Some(first) = imputation_passes(config).first() {
        println!("FIRST-PASS GROUPING (by {:?})", first.group_keys);
        println!("{}", "-".repeat(40));
        for target in &first.targets {
            match DataProfiler::group_medians(data, &first.group_keys, target) {
                Ok(groups) => {
                    let empty = groups.iter().filter(|g| g.non_null == 0).count();
                    println!(
                        "  {:<10} {} group(s), {} with no value to carry",
                        target,
                        groups.len(),
                        empty
                    );
                }
                Err(e) => println!("  {:<10} unavailable: {}", target, e),
            }
        }
        println!();
    }

    if let Err(e) = aq_processing::utils::ensure_columns(data, &config.required_columns()) {
        warn!("Input is not ready for processing: {}", e);
        println!("  WARNING: {}", e);
        println!();
    }

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}", config.output_path().display());
    if args.emit_report {
        println!(
            "  - {}",
            report_path(&config.output_dir, &config.output_name).display()
        );
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To execute the cleaning, run without --dry-run");
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Print a human-readable summary of the cleaning results.
fn print_human_readable_summary(summary: &CleaningSummary, args: &Args, output_path: &Path) {
    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input.display(),
        summary.rows_before,
        summary.columns_before
    );
    println!(
        "Output: {} ({} rows x {} columns)",
        output_path.display(),
        summary.rows_after,
        summary.columns_after
    );
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    for (column, count) in &summary.relabelled_cells {
        println!("  Relabelled '{}': {} cell(s)", column, count);
    }
    if summary.unparseable_dates > 0 {
        println!(
            "  Unparseable dates: {} (year carried from previous row)",
            summary.unparseable_dates
        );
    }
    if !summary.dropped_columns.is_empty() {
        println!("  Dropped columns: {}", summary.dropped_columns.join(", "));
    }
    println!();

    println!("Imputation:");
    for pass in summary.prefill.iter().chain(&summary.passes) {
        println!(
            "  {:<20} {:<14} {:>6} group(s) {:>8} filled {:>8} remaining",
            pass.name,
            pass.strategy.display_name(),
            pass.group_count,
            pass.total_filled(),
            pass.total_remaining()
        );
    }
    println!();

    if summary.is_fully_imputed() {
        println!("All pollutant values imputed.");
    } else {
        println!("Residual missing values:");
        for (column, count) in summary.residual_nulls.iter().filter(|(_, n)| **n > 0) {
            println!("  {}: {}", column, count);
        }
    }

    println!("{}", "=".repeat(80));
}
