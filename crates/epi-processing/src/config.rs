//! Configuration types for the cleaning pipeline.
//!
//! Every constant the pipeline depends on (the date window and the two
//! plausibility caps) lives in one immutable [`PipelineConfig`] that is
//! handed to each stage. The expected number of days per country is derived
//! from the window via [`PipelineConfig::expected_day_count`] and is never
//! stored separately, so changing the window cannot leave a stale day count
//! behind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// First day of the default observation window.
pub const DEFAULT_WINDOW_START: NaiveDate = match NaiveDate::from_ymd_opt(2020, 1, 1) {
    Some(date) => date,
    None => panic!("invalid default window start"),
};

/// Last day (inclusive) of the default observation window.
pub const DEFAULT_WINDOW_END: NaiveDate = match NaiveDate::from_ymd_opt(2022, 9, 17) {
    Some(date) => date,
    None => panic!("invalid default window end"),
};

/// Daily new confirmed cases above this value are implausible.
pub const DEFAULT_MAX_CONFIRMED_CAP: i64 = 400_000;

/// Daily new deaths above this value are implausible.
pub const DEFAULT_MAX_DECEASED_CAP: i64 = 10_000;

const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_OUTPUT_NAME: &str = "cleaned_epidemiology";

/// Inclusive calendar window `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Create a window, rejecting `end < start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigValidationError> {
        if end < start {
            return Err(ConfigValidationError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days in the window, both ends included.
    pub fn day_count(&self) -> usize {
        let span = (self.end - self.start).num_days();
        if span < 0 { 0 } else { span as usize + 1 }
    }

    /// Lazily yields every date of the window in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }

    /// Whether `date` falls inside the window.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Default for DateWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_WINDOW_START,
            end: DEFAULT_WINDOW_END,
        }
    }
}

/// File format of the cleaned output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Comma-separated values with a header row.
    #[default]
    Csv,
    /// Apache Parquet.
    Parquet,
}

impl OutputFormat {
    /// File extension (without the dot).
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
        }
    }
}

/// Configuration for the cleaning pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API, or [`PipelineConfig::from_json_file`] to load one.
/// Missing JSON fields fall back to their defaults.
///
/// # Example
///
/// ```rust,ignore
/// use epi_processing::config::PipelineConfig;
/// use chrono::NaiveDate;
///
/// let config = PipelineConfig::builder()
///     .window(
///         NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
///         NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
///     )
///     .max_confirmed_cap(250_000)
///     .build()?;
///
/// assert_eq!(config.expected_day_count(), 365);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// First day of the window (inclusive).
    /// Default: 2020-01-01
    pub window_start: NaiveDate,

    /// Last day of the window (inclusive).
    /// Default: 2022-09-17
    pub window_end: NaiveDate,

    /// Upper plausibility bound for `new_confirmed`. Values above it are
    /// counted as outliers and contribute zero to the cleaned table.
    /// Default: 400000
    pub max_confirmed_cap: i64,

    /// Upper plausibility bound for `new_deceased`.
    /// Default: 10000
    pub max_deceased_cap: i64,

    /// Output directory for the cleaned table and the run report.
    /// Default: "output"
    pub output_dir: PathBuf,

    /// Output file name (without extension).
    /// Default: "cleaned_epidemiology"
    pub output_name: String,

    /// File format of the cleaned table.
    /// Default: Csv
    pub output_format: OutputFormat,

    /// Whether to write the cleaned table to disk.
    /// When false, results are kept in memory only.
    /// Default: true
    pub save_to_disk: bool,

    /// Whether to write a JSON run report next to the cleaned table.
    /// Default: true
    pub generate_reports: bool,

    /// Run profiler, quality checker and cleaner on separate threads.
    /// Default: true
    pub parallel_stages: bool,

    /// Verify the cleaned table's invariants before writing it, failing
    /// the run on any violation.
    /// Default: true
    pub validate_output: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_start: DEFAULT_WINDOW_START,
            window_end: DEFAULT_WINDOW_END,
            max_confirmed_cap: DEFAULT_MAX_CONFIRMED_CAP,
            max_deceased_cap: DEFAULT_MAX_DECEASED_CAP,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            output_format: OutputFormat::default(),
            save_to_disk: true,
            generate_reports: true,
            parallel_stages: true,
            validate_output: true,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Load a configuration from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::PipelineError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// The configured observation window.
    pub fn window(&self) -> DateWindow {
        DateWindow {
            start: self.window_start,
            end: self.window_end,
        }
    }

    /// Days every country should have inside the window (991 for the default).
    pub fn expected_day_count(&self) -> usize {
        self.window().day_count()
    }

    /// Full path of the cleaned output table.
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            self.output_name,
            self.output_format.extension()
        ))
    }

    /// Full path of the JSON run report.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_report.json", self.output_name))
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        DateWindow::new(self.window_start, self.window_end)?;

        if self.max_confirmed_cap <= 0 {
            return Err(ConfigValidationError::InvalidCap {
                field: "max_confirmed_cap".to_string(),
                value: self.max_confirmed_cap,
            });
        }

        if self.max_deceased_cap <= 0 {
            return Err(ConfigValidationError::InvalidCap {
                field: "max_deceased_cap".to_string(),
                value: self.max_deceased_cap,
            });
        }

        if self.output_name.trim().is_empty() {
            return Err(ConfigValidationError::EmptyOutputName);
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid window: end {end} is before start {start}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("Invalid cap for '{field}': {value} (must be positive)")]
    InvalidCap { field: String, value: i64 },

    #[error("Output name must not be empty")]
    EmptyOutputName,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    window_start: Option<NaiveDate>,
    window_end: Option<NaiveDate>,
    max_confirmed_cap: Option<i64>,
    max_deceased_cap: Option<i64>,
    output_dir: Option<PathBuf>,
    output_name: Option<String>,
    output_format: Option<OutputFormat>,
    save_to_disk: Option<bool>,
    generate_reports: Option<bool>,
    parallel_stages: Option<bool>,
    validate_output: Option<bool>,
}

impl PipelineConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from JSON)
    /// so that individual fields can be overridden.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            window_start: Some(config.window_start),
            window_end: Some(config.window_end),
            max_confirmed_cap: Some(config.max_confirmed_cap),
            max_deceased_cap: Some(config.max_deceased_cap),
            output_dir: Some(config.output_dir),
            output_name: Some(config.output_name),
            output_format: Some(config.output_format),
            save_to_disk: Some(config.save_to_disk),
            generate_reports: Some(config.generate_reports),
            parallel_stages: Some(config.parallel_stages),
            validate_output: Some(config.validate_output),
        }
    }

    /// Set both window bounds (inclusive).
    pub fn window(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.window_start = Some(start);
        self.window_end = Some(end);
        self
    }

    /// Set the first day of the window.
    pub fn window_start(mut self, start: NaiveDate) -> Self {
        self.window_start = Some(start);
        self
    }

    /// Set the last day of the window.
    pub fn window_end(mut self, end: NaiveDate) -> Self {
        self.window_end = Some(end);
        self
    }

    /// Set the plausibility cap for daily new confirmed cases.
    pub fn max_confirmed_cap(mut self, cap: i64) -> Self {
        self.max_confirmed_cap = Some(cap);
        self
    }

    /// Set the plausibility cap for daily new deaths.
    pub fn max_deceased_cap(mut self, cap: i64) -> Self {
        self.max_deceased_cap = Some(cap);
        self
    }

    /// Set the output directory.
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Set the output file name (without extension).
    pub fn output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Set the output file format.
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Enable or disable writing the cleaned table to disk.
    pub fn save_to_disk(mut self, save: bool) -> Self {
        self.save_to_disk = Some(save);
        self
    }

    /// Enable or disable writing the JSON run report.
    pub fn generate_reports(mut self, generate: bool) -> Self {
        self.generate_reports = Some(generate);
        self
    }

    /// Run the three top-level stages concurrently or one after another.
    pub fn parallel_stages(mut self, parallel: bool) -> Self {
        self.parallel_stages = Some(parallel);
        self
    }

    /// Enable or disable post-clean invariant validation.
    pub fn validate_output(mut self, validate: bool) -> Self {
        self.validate_output = Some(validate);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let config = PipelineConfig {
            window_start: self.window_start.unwrap_or(DEFAULT_WINDOW_START),
            window_end: self.window_end.unwrap_or(DEFAULT_WINDOW_END),
            max_confirmed_cap: self.max_confirmed_cap.unwrap_or(DEFAULT_MAX_CONFIRMED_CAP),
            max_deceased_cap: self.max_deceased_cap.unwrap_or(DEFAULT_MAX_DECEASED_CAP),
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            output_name: self
                .output_name
                .unwrap_or_else(|| DEFAULT_OUTPUT_NAME.to_string()),
            output_format: self.output_format.unwrap_or_default(),
            save_to_disk: self.save_to_disk.unwrap_or(true),
            generate_reports: self.generate_reports.unwrap_or(true),
            parallel_stages: self.parallel_stages.unwrap_or(true),
            validate_output: self.validate_output.unwrap_or(true),
        };

        config.validate()?;
        Ok(config)
    }
}
