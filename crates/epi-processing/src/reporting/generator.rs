use crate::config::DateWindow;
use crate::error::{PipelineError, Result};
use crate::loader::StagedFile;
use crate::types::{CleaningSummary, DatasetProfile, PipelineResult, QualityReport};
use crate::validation::ValidationReport;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

// ============================================================================
// Run Report
// ============================================================================

/// Everything one run measured, in one document.
///
/// Dry runs produce a report without `cleaning` and `validation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the raw input, if it came from a file
    pub input_file: Option<String>,
    /// Path to the cleaned table, if it was written
    pub output_file: Option<String>,
    pub window: DateWindow,
    /// Days in the window, the coverage target for every country
    pub expected_days: usize,
    pub profile: DatasetProfile,
    pub quality: QualityReport,
    /// One line per defect category the quality audits found
    pub findings: Vec<String>,
    pub cleaning: Option<CleaningSummary>,
    pub validation: Option<ValidationReport>,
    pub duration_ms: u64,
}

// ============================================================================
// Report Generator
// ============================================================================

/// Builds run reports and writes them next to the cleaned table.
pub struct ReportGenerator {
    output_dir: PathBuf,
    output_name: String,
}

impl ReportGenerator {
    pub fn new(output_dir: PathBuf, output_name: impl Into<String>) -> Self {
        Self {
            output_dir,
            output_name: output_name.into(),
        }
    }

    /// Report for a completed run.
    pub fn build_run_report(input_file: Option<&str>, result: &PipelineResult) -> RunReport {
        RunReport {
            generated_at: Local::now().to_rfc3339(),
            input_file: input_file.map(String::from),
            output_file: result
                .output_path
                .as_ref()
                .map(|p| p.display().to_string()),
            window: result.profile.window,
            expected_days: result.profile.window.day_count(),
            profile: result.profile.clone(),
            findings: result.quality.findings(),
            quality: result.quality.clone(),
            cleaning: Some(result.cleaning.clone()),
            validation: result.validation.clone(),
            duration_ms: result.duration_ms,
        }
    }

    /// Report for a dry run: profile and audits only.
    pub fn build_dry_run_report(
        input_file: Option<&str>,
        profile: &DatasetProfile,
        quality: &QualityReport,
        duration_ms: u64,
    ) -> RunReport {
        RunReport {
            generated_at: Local::now().to_rfc3339(),
            input_file: input_file.map(String::from),
            output_file: None,
            window: profile.window,
            expected_days: profile.window.day_count(),
            profile: profile.clone(),
            findings: quality.findings(),
            quality: quality.clone(),
            cleaning: None,
            validation: None,
            duration_ms,
        }
    }

    /// Where [`stage_report`](Self::stage_report) writes once committed.
    pub fn report_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_report.json", self.output_name))
    }

    /// Serialize `report` beside [`report_path`](Self::report_path)
    /// without replacing the existing report yet.
    pub fn stage_report(&self, report: &RunReport) -> Result<StagedFile> {
        let report_path = self.report_path();
        let json = serde_json::to_string_pretty(report)?;
        StagedFile::create(&report_path, |file| Ok(file.write_all(json.as_bytes())?))
            .map_err(|e| {
                PipelineError::ReportGenerationFailed(format!("{}: {}", report_path.display(), e))
            })
    }
}

/// Error for a staged report that could not be moved into place.
pub(crate) fn report_commit_failed(path: &Path, e: std::io::Error) -> PipelineError {
    PipelineError::ReportGenerationFailed(format!("{}: {}", path.display(), e))
}
