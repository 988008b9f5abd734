//! Report generation module.
//!
//! A [`RunReport`] gathers everything one run measured (profile, quality
//! audits, cleaning summary, validation result) in a single serializable
//! document. It is used for:
//! - JSON output to stdout (`--json` CLI flag)
//! - JSON file output next to the cleaned table (`--emit-report` CLI flag)
//! - Programmatic access in library mode
//!
//! # Example
//!
//! ```rust,ignore
//! use epi_processing::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new(PathBuf::from("output"), "cleaned_epidemiology");
//! let report = ReportGenerator::build_run_report(Some("data/epidemiology.csv"), &result);
//!
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! generator.stage_report(&report)?.commit()?;
//! ```

mod generator;

pub(crate) use generator::report_commit_failed;
pub use generator::{ReportGenerator, RunReport};
