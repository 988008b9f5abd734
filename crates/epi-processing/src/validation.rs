//! Structural checks on the cleaned table before it is written.
//!
//! The cleaner is deterministic, so a failed check here means a defect in
//! the pipeline rather than in the input. Errors make the report invalid;
//! warnings are informational.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::*;
use crate::scope;
use crate::utils::scalar_u64;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Outcome of validating the cleaned table.
///
/// # Examples
///
/// ```
/// use epi_processing::validation::ValidationReport;
///
/// let mut report = ValidationReport::new();
/// assert!(report.is_valid);
///
/// report.add_error("2 duplicate keys".to_string());
/// assert!(!report.is_valid);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: ValidationStats,
}

/// Counts gathered while validating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStats {
    pub total_rows: u64,
    /// Window days × catalog countries.
    pub expected_rows: u64,
    pub duplicate_keys: u64,
    pub out_of_window_rows: u64,
    pub negative_values: u64,
    pub values_above_cap: u64,
    /// Countries carrying more than one population value.
    pub unstable_population_keys: u64,
    pub filler_rows: u64,
    /// Filler rows with any non-zero metric.
    pub nonzero_filler_rows: u64,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            stats: ValidationStats::default(),
        }
    }

    /// Adds an error and marks the report invalid.
    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Errors joined into one line.
    pub fn summary(&self) -> String {
        self.errors.join("; ")
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OutputValidator;

impl OutputValidator {
    /// Check density, key uniqueness, window bounds, metric ranges,
    /// population stability and filler rows of `cleaned`.
    pub fn validate(
        cleaned: &DataFrame,
        config: &PipelineConfig,
        catalog_size: usize,
    ) -> Result<ValidationReport> {
        let window = config.window();
        let mut report = ValidationReport::new();

        let is_filler = col(RECORD_EXISTS).not();
        let any_metric_set = COUNT_METRICS
            .iter()
            .fold(col(STRINGENCY_INDEX).neq(lit(0.0)), |acc, name| {
                acc.or(col(*name).neq(lit(0i64)))
            });
        let negative = COUNT_METRICS
            .iter()
            .map(|name| col(*name).lt(lit(0i64)).sum().cast(DataType::UInt64))
            .reduce(|acc, e| acc + e)
            .unwrap_or_else(|| lit(0u64));

        let counts = cleaned
            .clone()
            .lazy()
            .select([
                len().alias("total_rows"),
                scope::in_window(&window)
                    .not()
                    .fill_null(lit(true))
                    .sum()
                    .alias("out_of_window_rows"),
                negative.alias("negative_values"),
                (col(NEW_CONFIRMED)
                    .gt(lit(config.max_confirmed_cap))
                    .sum()
                    .cast(DataType::UInt64)
                    + col(NEW_DECEASED)
                        .gt(lit(config.max_deceased_cap))
                        .sum()
                        .cast(DataType::UInt64))
                .alias("values_above_cap"),
                is_filler.clone().sum().alias("filler_rows"),
                is_filler
                    .and(any_metric_set)
                    .sum()
                    .alias("nonzero_filler_rows"),
            ])
            .collect()?;

        let duplicates = cleaned
            .clone()
            .lazy()
            .group_by([col(DATE), col(LOCATION_KEY)])
            .agg([len().alias("rows")])
            .select([col("rows").gt(lit(1)).sum().alias("duplicate_keys")])
            .collect()?;

        let populations = cleaned
            .clone()
            .lazy()
            .group_by([col(LOCATION_KEY)])
            .agg([col(POPULATION).n_unique().alias("values")])
            .select([col("values").gt(lit(1)).sum().alias("unstable")])
            .collect()?;

        report.stats = ValidationStats {
            total_rows: scalar_u64(&counts, "total_rows")?,
            expected_rows: (window.day_count() * catalog_size) as u64,
            duplicate_keys: scalar_u64(&duplicates, "duplicate_keys")?,
            out_of_window_rows: scalar_u64(&counts, "out_of_window_rows")?,
            negative_values: scalar_u64(&counts, "negative_values")?,
            values_above_cap: scalar_u64(&counts, "values_above_cap")?,
            unstable_population_keys: scalar_u64(&populations, "unstable")?,
            filler_rows: scalar_u64(&counts, "filler_rows")?,
            nonzero_filler_rows: scalar_u64(&counts, "nonzero_filler_rows")?,
        };

        let stats = report.stats.clone();
        if stats.total_rows != stats.expected_rows {
            report.add_error(format!(
                "Row count {} differs from {} days x {} countries = {}",
                stats.total_rows,
                window.day_count(),
                catalog_size,
                stats.expected_rows
            ));
        }
        if stats.duplicate_keys > 0 {
            report.add_error(format!(
                "{} (date, location_key) keys occur more than once",
                stats.duplicate_keys
            ));
        }
        if stats.out_of_window_rows > 0 {
            report.add_error(format!(
                "{} rows fall outside {} .. {}",
                stats.out_of_window_rows, window.start, window.end
            ));
        }
        if stats.negative_values > 0 {
            report.add_error(format!("{} negative metric values", stats.negative_values));
        }
        if stats.values_above_cap > 0 {
            report.add_error(format!(
                "{} metric values above their caps",
                stats.values_above_cap
            ));
        }
        if stats.unstable_population_keys > 0 {
            report.add_error(format!(
                "{} countries carry more than one population value",
                stats.unstable_population_keys
            ));
        }
        if stats.nonzero_filler_rows > 0 {
            report.add_error(format!(
                "{} filler rows have non-zero metrics",
                stats.nonzero_filler_rows
            ));
        }

        if catalog_size == 0 {
            report.add_warning("No country has a population value; the table is empty".into());
        } else if stats.total_rows > 0 && stats.filler_rows * 2 > stats.total_rows {
            report.add_warning(format!(
                "{} of {} rows are filler rows",
                stats.filler_rows, stats.total_rows
            ));
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::DataCleaner;
    use crate::test_support::{dataset, date, row};

    fn config() -> PipelineConfig {
        PipelineConfig::builder()
            .window(date("2020-01-01"), date("2020-01-03"))
            .build()
            .unwrap()
    }

    fn cleaned() -> DataFrame {
        let raw = dataset(&[
            row("2020-01-01", "US"),
            row("2020-01-02", "US"),
            row("2020-01-01", "FR"),
        ]);
        DataCleaner::clean(&raw, &config()).unwrap().0
    }

    fn replace_i64(df: &DataFrame, name: &str, values: Vec<Option<i64>>) -> DataFrame {
        let mut df = df.clone();
        df.replace(name, Series::new(name.into(), values)).unwrap();
        df
    }

    #[test]
    fn test_cleaned_table_is_valid() {
        let report = OutputValidator::validate(&cleaned(), &config(), 2).unwrap();

        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(report.stats.total_rows, 6);
        assert_eq!(report.stats.expected_rows, 6);
        assert_eq!(report.stats.filler_rows, 3);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_density_violation() {
        let report = OutputValidator::validate(&cleaned(), &config(), 3).unwrap();

        assert!(!report.is_valid);
        assert!(report.errors[0].contains("Row count 6"));
    }

    #[test]
    fn test_duplicate_key_violation() {
        let df = cleaned();
        let doubled = df.vstack(&df.head(Some(1))).unwrap();

        let report = OutputValidator::validate(&doubled, &config(), 2).unwrap();

        assert!(!report.is_valid);
        assert_eq!(report.stats.duplicate_keys, 1);
    }

    #[test]
    fn test_metric_violations() {
        let df = replace_i64(
            &cleaned(),
            NEW_CONFIRMED,
            vec![Some(-1), Some(0), Some(500_000), Some(0), Some(0), Some(3)],
        );

        let report = OutputValidator::validate(&df, &config(), 2).unwrap();

        assert!(!report.is_valid);
        assert_eq!(report.stats.negative_values, 1);
        assert_eq!(report.stats.values_above_cap, 1);
        // Rows 2 and 5 are filler rows.
        assert_eq!(report.stats.nonzero_filler_rows, 2);
    }

    #[test]
    fn test_unstable_population() {
        let df = replace_i64(
            &cleaned(),
            POPULATION,
            vec![Some(1), Some(1), Some(1), Some(1), Some(1), Some(2)],
        );

        let report = OutputValidator::validate(&df, &config(), 2).unwrap();

        assert_eq!(report.stats.unstable_population_keys, 1);
        assert!(report.summary().contains("more than one population"));
    }

    #[test]
    fn test_empty_catalog_warns() {
        let raw = dataset(&[row("2020-01-01", "US").population(None)]);
        let (df, _) = DataCleaner::clean(&raw, &config()).unwrap();

        let report = OutputValidator::validate(&df, &config(), 0).unwrap();

        assert!(report.is_valid);
        assert_eq!(report.warnings.len(), 1);
    }
}
