//! CLI entry point for the epidemiological cleaning pipeline.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use epi_processing::{
    DatasetProfile, OutputFormat, Pipeline, PipelineConfig, PipelineConfigBuilder, PipelineResult,
    QualityReport, RawDataset, ReportGenerator,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// CLI-compatible output format enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// Apache Parquet
    Parquet,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(cli: CliOutputFormat) -> Self {
        match cli {
            CliOutputFormat::Csv => OutputFormat::Csv,
            CliOutputFormat::Parquet => OutputFormat::Parquet,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Epidemiological Time-Series Cleaning Pipeline",
    long_about = "Profiles, audits and cleans a raw table of daily epidemiological \
                  observations into a dense country-level table.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RUST_LOG              Log filter (overrides --log-level)\n\n\
                  EXAMPLES:\n  \
                  # Clean with the default window and caps\n  \
                  epi-processing -i epidemiology.csv\n\n  \
                  # Narrow the window and write Parquet\n  \
                  epi-processing -i epidemiology.csv --window-start 2021-01-01 --format parquet\n\n  \
                  # Profile and audit only\n  \
                  epi-processing -i epidemiology.csv --dry-run"
)]
struct Args {
    /// Path to the raw observations (CSV or Parquet)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the cleaned table and report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file name (without extension)
    #[arg(long)]
    output_name: Option<String>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// First day of the analysis window (YYYY-MM-DD)
    #[arg(long)]
    window_start: Option<NaiveDate>,

    /// Last day of the analysis window, inclusive (YYYY-MM-DD)
    #[arg(long)]
    window_end: Option<NaiveDate>,

    /// Largest plausible daily new_confirmed value
    #[arg(long)]
    confirmed_cap: Option<i64>,

    /// Largest plausible daily new_deceased value
    #[arg(long)]
    deceased_cap: Option<i64>,

    /// Format of the cleaned table
    #[arg(long, value_enum)]
    format: Option<CliOutputFormat>,

    /// Profile and audit the input without cleaning or writing anything
    #[arg(long)]
    dry_run: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    /// Useful for piping to other tools: `... --json | jq .findings`
    #[arg(long)]
    json: bool,

    /// Write a detailed JSON report next to the cleaned table
    ///
    /// The report will be saved as <output_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Skip structural validation of the cleaned table
    #[arg(long)]
    no_validate: bool,

    /// Run profiling, quality checks and cleaning one after another
    #[arg(long)]
    sequential: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
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

    // Load .env first so RUST_LOG from it reaches the filter
    dotenv().ok();

    init_logging(&args.log_level, args.quiet, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let config = build_config(&args)?;

    if args.dry_run {
        return run_dry_run(&args, config);
    }

    let pipeline = build_pipeline(&args, config)?;

    run_pipeline(&pipeline, &args)
}

/// Merge the optional JSON config file with command-line overrides.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let base = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfigBuilder::from_config(base);

    if let Some(ref output) = args.output {
        builder = builder.output_dir(output);
    }
    if let Some(ref name) = args.output_name {
        builder = builder.output_name(name);
    }
    if let Some(start) = args.window_start {
        builder = builder.window_start(start);
    }
    if let Some(end) = args.window_end {
        builder = builder.window_end(end);
    }
    if let Some(cap) = args.confirmed_cap {
        builder = builder.max_confirmed_cap(cap);
    }
    if let Some(cap) = args.deceased_cap {
        builder = builder.max_deceased_cap(cap);
    }
    if let Some(format) = args.format {
        builder = builder.output_format(format.into());
    }
    if args.no_validate {
        builder = builder.validate_output(false);
    }
    if args.sequential {
        builder = builder.parallel_stages(false);
    }

    // Report output is only written on request
    let config = builder
        .save_to_disk(!args.dry_run)
        .generate_reports(args.emit_report && !args.dry_run)
        .build()?;

    Ok(config)
}

fn build_pipeline(args: &Args, config: PipelineConfig) -> Result<Pipeline> {
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

    Ok(builder.build()?)
}

/// Run dry-run mode - profile and audit without cleaning
///
/// Note: This function uses `println!` intentionally for user-facing CLI output.
/// Unlike logging (`info!`, `debug!`), this output should always be visible
/// regardless of log level settings since it's the primary purpose of --dry-run.
fn run_dry_run(args: &Args, config: PipelineConfig) -> Result<()> {
    let start_time = Instant::now();

    info!("Loading dataset from: {}", args.input.display());
    let raw = RawDataset::from_path(&args.input)?;
    info!("Dataset loaded successfully: {} rows", raw.height());

    let pipeline = Pipeline::builder().config(config.clone()).build()?;
    let (profile, quality) = pipeline.dry_run(&raw)?;

    let input = args.input.display().to_string();
    if args.json {
        let report = ReportGenerator::build_dry_run_report(
            Some(&input),
            &profile,
            &quality,
            start_time.elapsed().as_millis() as u64,
        );
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Profile and quality audit");
    println!("{}\n", "=".repeat(80));

    println!("DATASET OVERVIEW");
    println!("{}", "-".repeat(40));
    println!("  File: {}", input);
    println!("  Raw rows: {}", raw.height());
    println!(
        "  Window: {} .. {} ({} days)",
        config.window_start,
        config.window_end,
        config.expected_day_count()
    );
    println!();

    print_profile(&profile);
    print_quality(&quality);

    println!("CLEANING PREVIEW");
    println!("{}", "-".repeat(40));
    println!(
        "  Countries kept: {} ({} without population dropped)",
        quality.metadata.countries_with_population,
        quality.metadata.countries_without_population()
    );
    println!(
        "  Expected rows: {} x {} = {}",
        config.expected_day_count(),
        quality.metadata.countries_with_population,
        config.expected_day_count() as u64 * quality.metadata.countries_with_population
    );
    println!(
        "  Duplicated keys (all locations): {}",
        quality.duplicates.duplicated_keys
    );
    println!();

    println!("OUTPUT FILES (will be created)");
    println!("{}", "-".repeat(40));
    println!("  - {}", config.output_path().display());
    if args.emit_report {
        println!("  - {}", config.report_path().display());
    }
    println!();

    println!("{}", "=".repeat(80));
    println!("To clean the dataset, run without --dry-run");
    if !args.emit_report {
        println!("Add --emit-report to save a detailed JSON report");
    }
    println!("{}", "=".repeat(80));

    Ok(())
}

/// Run the pipeline and print results.
///
/// Output behavior:
/// - Default: Print human-readable summary to stdout
/// - `--json`: Print JSON to stdout only (no logs)
/// - `--emit-report`: Write JSON report to file
fn run_pipeline(pipeline: &Pipeline, args: &Args) -> Result<()> {
    info!("{}", "=".repeat(80));
    info!("Starting cleaning pipeline...");
    info!("{}", "=".repeat(80));

    let result = pipeline.run_path(&args.input).map_err(|e| {
        error!("Pipeline failed: {}", e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if args.json {
        let input = args.input.display().to_string();
        let report = ReportGenerator::build_run_report(Some(&input), &result);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(ref path) = result.report_path {
        info!("Report written to: {}", path.display());
    }

    print_human_readable_summary(&result, args);

    Ok(())
}

fn print_profile(profile: &DatasetProfile) {
    println!("PROFILE");
    println!("{}", "-".repeat(40));
    println!("  Rows in window: {}", profile.total_rows);
    println!(
        "  Date range: {} .. {} ({} distinct dates)",
        fmt_date(profile.min_date),
        fmt_date(profile.max_date),
        profile.distinct_dates
    );
    println!(
        "  Locations: ~{} (approx), {} country keys",
        profile.approx_location_keys, profile.country_keys
    );
    println!(
        "  Rows: {} country-level, {} sub-national",
        profile.country_level_rows, profile.subnational_rows
    );
    println!();
}

fn print_quality(quality: &QualityReport) {
    println!("DATA QUALITY ISSUES");
    println!("{}", "-".repeat(40));
    let findings = quality.findings();
    if findings.is_empty() {
        println!("  No data quality issues detected");
    } else {
        for finding in findings {
            println!("  - {}", finding);
        }
    }
    println!();
}

/// Print a human-readable summary of the cleaning results.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(result: &PipelineResult, args: &Args) {
    let cleaning = &result.cleaning;

    println!();
    println!("{}", "=".repeat(80));
    println!("CLEANING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows in window)",
        args.input.display(),
        result.profile.total_rows
    );
    match result.output_path {
        Some(ref path) => println!(
            "Output: {} ({} rows x {} columns)",
            path.display(),
            result.cleaned.height(),
            result.cleaned.width()
        ),
        None => println!(
            "Output: not written ({} rows x {} columns)",
            result.cleaned.height(),
            result.cleaned.width()
        ),
    }
    println!();

    println!("Cleaning Summary:");
    println!("  Duration: {}ms", result.duration_ms);
    println!(
        "  Grid: {} countries x {} days = {} rows",
        cleaning.catalog_countries, cleaning.window_days, cleaning.grid_rows
    );
    println!(
        "  Rows: {} observed, {} filler",
        cleaning.matched_rows, cleaning.filler_rows
    );
    println!(
        "  Duplicates: {} keys rejected ({} raw rows)",
        cleaning.rejected_duplicate_groups, cleaning.rejected_duplicate_rows
    );
    if let Some(ref validation) = result.validation {
        println!(
            "  Validation: {} ({} warnings)",
            if validation.is_valid { "passed" } else { "failed" },
            validation.warnings.len()
        );
    }
    println!();

    let findings = result.quality.findings();
    if !findings.is_empty() {
        println!("Quality Findings:");
        for finding in findings {
            println!("  - {}", finding);
        }
        println!();
    }

    if let Some(ref path) = result.report_path {
        println!("Report: {}", path.display());
        println!();
    }

    println!("{}", "=".repeat(80));
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| "n/a".to_string(), |d| d.to_string())
}
