//! Epidemiological Time-Series Cleaning Library
//!
//! A batch pipeline built with Rust and Polars that turns a raw, sparse,
//! multi-granularity table of daily epidemiological observations into a
//! dense, country-level table fit for downstream modeling.
//!
//! # Overview
//!
//! A run reads one raw snapshot and performs three read-only analyses of it:
//!
//! - **Profiling**: volume and coverage inside the analysis window
//! - **Quality Checking**: six independent audits (nulls, negative values,
//!   duplicate keys, implausible spikes, coverage gaps, missing metadata)
//! - **Cleaning**: a country catalog, a complete date grid, sanitized
//!   observations with duplicate groups rejected, and a left join of the
//!   grid against the observations
//!
//! The cleaned table is then validated and written, replacing any previous
//! output. Runs are idempotent: the same input and configuration produce
//! the same table.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use epi_processing::{Pipeline, PipelineConfig};
//! use chrono::NaiveDate;
//!
//! let config = PipelineConfig::builder()
//!     .window(
//!         NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2022, 9, 17).unwrap(),
//!     )
//!     .output_dir("output")
//!     .build()?;
//!
//! let result = Pipeline::builder()
//!     .config(config)
//!     .build()?
//!     .run_path("data/epidemiology.csv")?;
//!
//! println!("{} rows, {} filler", result.cleaned.height(), result.cleaning.filler_rows);
//! for finding in result.quality.findings() {
//!     println!("- {}", finding);
//! }
//! ```
//!
//! # Progress Reporting
//!
//! ```rust,ignore
//! use epi_processing::{Pipeline, CancellationToken, PipelineError};
//!
//! let token = CancellationToken::new();
//!
//! let result = Pipeline::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()?
//!     .run(&raw);
//!
//! match result {
//!     Ok(result) => println!("Wrote {:?}", result.output_path),
//!     Err(PipelineError::Cancelled) => println!("Cancelled, nothing written"),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod schema;
pub mod scope;
pub mod types;
pub mod utils;
pub mod validation;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use cleaner::DataCleaner;
pub use config::{
    ConfigValidationError, DateWindow, OutputFormat, PipelineConfig, PipelineConfigBuilder,
};
pub use error::{PipelineError, Result, ResultExt};
pub use loader::RawDataset;
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, Pipeline, PipelineBuilder, PipelineStage,
    ProgressReporter, ProgressUpdate,
};
pub use profiler::DataProfiler;
pub use quality::DataQualityAnalyzer;
pub use reporting::{ReportGenerator, RunReport};
pub use types::{
    CleaningSummary, CoverageAudit, DatasetProfile, DuplicateAudit, MetadataAudit,
    NegativeValueAudit, NullAudit, OutlierAudit, PipelineResult, QualityReport,
};
pub use validation::{OutputValidator, ValidationReport};
