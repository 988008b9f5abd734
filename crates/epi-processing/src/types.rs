use crate::config::DateWindow;
use crate::validation::ValidationReport;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Profiler output
// ============================================================================

/// Volume and coverage summary of the raw dataset inside the window.
///
/// Only rows with a date inside the window and a non-null `location_key`
/// are counted. An empty scope yields zero counts and `None` dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Window the profile was computed over.
    pub window: DateWindow,
    /// Rows in scope.
    pub total_rows: u64,
    /// Earliest date in scope.
    pub min_date: Option<NaiveDate>,
    /// Latest date in scope.
    pub max_date: Option<NaiveDate>,
    /// Distinct dates in scope.
    pub distinct_dates: u64,
    /// Approximate distinct `location_key` count (HyperLogLog estimate).
    /// Not comparable with the exact counts of the quality report.
    pub approx_location_keys: u64,
    /// Exact distinct keys matching the two-letter country pattern.
    pub country_keys: u64,
    /// Rows at aggregation level 0.
    pub country_level_rows: u64,
    /// Rows at aggregation level above 0.
    pub subnational_rows: u64,
}

// ============================================================================
// Quality checker output
// ============================================================================

/// Null count of one audited column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNullCount {
    pub column: String,
    pub null_count: u64,
    pub null_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NullAudit {
    pub total_rows: u64,
    pub columns: Vec<ColumnNullCount>,
}

impl NullAudit {
    /// Null count of `column`, if it was audited.
    pub fn null_count(&self, column: &str) -> Option<u64> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.null_count)
    }
}

/// Rows whose count metrics are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeValueAudit {
    pub negative_new_confirmed: u64,
    pub negative_new_deceased: u64,
    pub negative_cumulative_confirmed: u64,
    pub negative_new_persons_vaccinated: u64,
    /// Smallest observed `new_confirmed`, to show how negative it gets.
    pub min_new_confirmed: Option<i64>,
    pub min_new_deceased: Option<i64>,
}

impl NegativeValueAudit {
    pub fn total(&self) -> u64 {
        self.negative_new_confirmed
            + self.negative_new_deceased
            + self.negative_cumulative_confirmed
            + self.negative_new_persons_vaccinated
    }
}

/// Violations of the one-row-per-(date, location_key) expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateAudit {
    pub total_rows: u64,
    pub distinct_keys: u64,
    /// `total_rows - distinct_keys`.
    pub duplicate_rows: u64,
    /// Keys that occur more than once, at any aggregation level.
    pub duplicated_keys: u64,
}

/// Country-level maxima and rows above the plausibility caps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierAudit {
    pub max_new_confirmed: Option<i64>,
    pub max_new_deceased: Option<i64>,
    pub max_cumulative_confirmed: Option<i64>,
    pub max_new_persons_vaccinated: Option<i64>,
    pub confirmed_cap: i64,
    pub deceased_cap: i64,
    pub confirmed_above_cap: u64,
    pub deceased_above_cap: u64,
}

/// Per-country date coverage against the window length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageAudit {
    /// Derived from the window bounds.
    pub expected_days: u64,
    pub countries_evaluated: u64,
    pub countries_with_gaps: u64,
    /// Mean of `expected_days - observed_days` over every evaluated country.
    pub avg_missing_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataAudit {
    /// Exact distinct two-letter keys at aggregation level 0.
    pub country_keys: u64,
    /// Of those, keys with at least one non-null population (catalog size).
    pub countries_with_population: u64,
}

impl MetadataAudit {
    /// Countries the cleaner will drop for lack of a population value.
    pub fn countries_without_population(&self) -> u64 {
        self.country_keys
            .saturating_sub(self.countries_with_population)
    }
}

/// Combined result of the six independent quality sub-audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub nulls: NullAudit,
    pub negatives: NegativeValueAudit,
    pub duplicates: DuplicateAudit,
    pub outliers: OutlierAudit,
    pub coverage: CoverageAudit,
    pub metadata: MetadataAudit,
}

impl QualityReport {
    /// Short human-readable findings, one line per defect category present.
    pub fn findings(&self) -> Vec<String> {
        let mut findings = Vec::new();

        let null_columns: Vec<String> = self
            .nulls
            .columns
            .iter()
            .filter(|c| c.null_count > 0)
            .map(|c| format!("{} ({:.1}%)", c.column, c.null_percentage))
            .collect();
        if !null_columns.is_empty() {
            findings.push(format!("Null values in: {}", null_columns.join(", ")));
        }

        if self.negatives.total() > 0 {
            findings.push(format!(
                "{} negative metric values (min new_confirmed: {}, min new_deceased: {})",
                self.negatives.total(),
                fmt_opt(self.negatives.min_new_confirmed),
                fmt_opt(self.negatives.min_new_deceased)
            ));
        }

        if self.duplicates.duplicate_rows > 0 {
            findings.push(format!(
                "{} excess rows across {} duplicated (date, location_key) keys",
                self.duplicates.duplicate_rows, self.duplicates.duplicated_keys
            ));
        }

        if self.outliers.confirmed_above_cap > 0 || self.outliers.deceased_above_cap > 0 {
            findings.push(format!(
                "{} rows above new_confirmed cap {}, {} rows above new_deceased cap {}",
                self.outliers.confirmed_above_cap,
                self.outliers.confirmed_cap,
                self.outliers.deceased_above_cap,
                self.outliers.deceased_cap
            ));
        }

        if self.coverage.countries_with_gaps > 0 {
            findings.push(format!(
                "{} of {} countries miss dates (avg {:.1} of {} days missing)",
                self.coverage.countries_with_gaps,
                self.coverage.countries_evaluated,
                self.coverage.avg_missing_days.unwrap_or(0.0),
                self.coverage.expected_days
            ));
        }

        if self.metadata.countries_without_population() > 0 {
            findings.push(format!(
                "{} countries have no population value and will be excluded",
                self.metadata.countries_without_population()
            ));
        }

        findings
    }
}

fn fmt_opt(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

// ============================================================================
// Cleaner output
// ============================================================================

/// Counts describing one cleaner run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningSummary {
    /// Countries in the resolved catalog.
    pub catalog_countries: usize,
    /// Days in the window.
    pub window_days: usize,
    /// `catalog_countries * window_days`.
    pub grid_rows: usize,
    /// Sanitized (date, location_key) groups kept after duplicate rejection.
    pub observation_groups: usize,
    /// Groups dropped because more than one raw row shared their key.
    pub rejected_duplicate_groups: usize,
    /// Raw rows inside those rejected groups.
    pub rejected_duplicate_rows: usize,
    /// Grid rows matched to an observation (`record_exists = true`).
    pub matched_rows: usize,
    /// Synthesized filler rows (`record_exists = false`).
    pub filler_rows: usize,
}

// ============================================================================
// Pipeline output
// ============================================================================

/// Everything a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub profile: DatasetProfile,
    pub quality: QualityReport,
    pub cleaning: CleaningSummary,
    /// `None` when output validation is disabled.
    pub validation: Option<ValidationReport>,
    /// The dense cleaned table, sorted by (date, location_key).
    pub cleaned: DataFrame,
    /// Where the cleaned table was written, if it was.
    pub output_path: Option<PathBuf>,
    /// Where the run report was written, if it was.
    pub report_path: Option<PathBuf>,
    pub duration_ms: u64,
}
