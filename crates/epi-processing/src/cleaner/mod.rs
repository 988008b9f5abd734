//! Data cleaning module producing the dense country-level table.
//!
//! The cleaner runs four deterministic passes over the raw snapshot:
//! - Country catalog resolution (one population and name per country)
//! - Date grid generation (every day of the window for every country)
//! - Observation aggregation with range sanitization and duplicate rejection
//! - A left join of the grid against the observations
//!
//! Catalog resolution and observation aggregation do not depend on each
//! other and run on separate threads.

mod catalog;
mod grid;
mod observations;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::loader::RawDataset;
use crate::schema::*;
use crate::types::CleaningSummary;
use polars::prelude::*;
use std::thread;
use tracing::{debug, info, warn};

/// Data cleaner turning raw observations into cleaned records.
pub struct DataCleaner;

impl DataCleaner {
    /// Build the cleaned table, sorted by (`date`, `location_key`).
    ///
    /// Every catalog country gets exactly one row per day of the window.
    /// Days without a surviving observation are filler rows with zero
    /// metrics and `record_exists = false`.
    pub fn clean(raw: &RawDataset, config: &PipelineConfig) -> Result<(DataFrame, CleaningSummary)> {
        let window = config.window();

        info!("Cleaning observations for {} .. {}", window.start, window.end);

        let (catalog, observations) = thread::scope(|s| {
            let catalog = s.spawn(|| catalog::resolve_catalog(raw, &window));
            let observations = observations::sanitize_observations(
                raw,
                &window,
                config.max_confirmed_cap,
                config.max_deceased_cap,
            );
            let catalog = catalog
                .join()
                .map_err(|_| PipelineError::Internal("catalog thread panicked".to_string()));
            (catalog, observations)
        });
        let catalog = catalog?
            .map_err(cleaning_failed)
            .context("catalog resolution")?;
        let observations = observations
            .map_err(cleaning_failed)
            .context("observation aggregation")?;
        debug!(
            "Resolved {} catalog countries, {} observation groups",
            catalog.height(),
            observations.frame.height()
        );

        if observations.rejected_groups > 0 {
            warn!(
                "Rejected {} duplicated (date, location_key) groups ({} raw rows)",
                observations.rejected_groups, observations.rejected_rows
            );
        }

        let grid = grid::build_grid(&catalog, &window)
            .map_err(cleaning_failed)
            .context("grid generation")?;
        debug!("Generated grid of {} rows", grid.height());

        let cleaned = Self::dense_join(grid.clone(), observations.frame.clone())
            .map_err(cleaning_failed)
            .context("dense join")?;

        let matched_rows = cleaned
            .column(RECORD_EXISTS)?
            .as_materialized_series()
            .bool()?
            .num_trues();

        let summary = CleaningSummary {
            catalog_countries: catalog.height(),
            window_days: window.day_count(),
            grid_rows: grid.height(),
            observation_groups: observations.frame.height(),
            rejected_duplicate_groups: observations.rejected_groups,
            rejected_duplicate_rows: observations.rejected_rows,
            matched_rows,
            filler_rows: cleaned.height() - matched_rows,
        };

        info!(
            "Cleaned table: {} rows ({} observed, {} filler) for {} countries",
            cleaned.height(),
            summary.matched_rows,
            summary.filler_rows,
            summary.catalog_countries
        );

        Ok((cleaned, summary))
    }

    /// Left join grid ⟕ observations on (`date`, `location_key`).
    fn dense_join(grid: DataFrame, observations: DataFrame) -> PolarsResult<DataFrame> {
        let metric = |name: &str| col(name).fill_null(lit(0i64)).alias(name);

        grid.lazy()
            .join(
                observations.lazy(),
                [col(DATE), col(LOCATION_KEY)],
                [col(DATE), col(LOCATION_KEY)],
                JoinArgs::new(JoinType::Left),
            )
            .select([
                col(DATE),
                col(LOCATION_KEY),
                col(AGGREGATION_LEVEL),
                col(COUNTRY_NAME),
                col(POPULATION),
                metric(NEW_CONFIRMED),
                metric(NEW_DECEASED),
                metric(CUMULATIVE_CONFIRMED),
                metric(NEW_PERSONS_VACCINATED),
                col(STRINGENCY_INDEX)
                    .fill_null(lit(0.0))
                    .alias(STRINGENCY_INDEX),
                col(RECORD_EXISTS)
                    .fill_null(lit(false))
                    .alias(RECORD_EXISTS),
            ])
            .sort_by_exprs(
                [col(DATE), col(LOCATION_KEY)],
                SortMultipleOptions::default(),
            )
            .collect()
    }
}

fn cleaning_failed(e: PolarsError) -> PipelineError {
    PipelineError::CleaningFailed(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dataset, date, row};
    use pretty_assertions::assert_eq;

    fn config(start: &str, end: &str) -> PipelineConfig {
        PipelineConfig::builder()
            .window(date(start), date(end))
            .build()
            .unwrap()
    }

    fn bools(df: &DataFrame, name: &str) -> Vec<Option<bool>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .bool()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn keys(df: &DataFrame) -> Vec<Option<String>> {
        df.column(LOCATION_KEY)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn test_clean_is_dense_and_sorted() {
        let raw = dataset(&[
            row("2020-01-02", "US"),
            row("2020-01-01", "FR"),
            row("2020-01-03", "US"),
            row("2020-01-02", "US_CA"),
        ]);

        let (cleaned, summary) = DataCleaner::clean(&raw, &config("2020-01-01", "2020-01-03")).unwrap();

        assert_eq!(cleaned.height(), 6);
        assert_eq!(cleaned.get_column_names_str(), CLEANED_COLUMNS.to_vec());
        assert_eq!(
            keys(&cleaned),
            ["FR", "US", "FR", "US", "FR", "US"]
                .iter()
                .map(|k| Some(k.to_string()))
                .collect::<Vec<_>>()
        );
        assert_eq!(
            bools(&cleaned, RECORD_EXISTS),
            vec![
                Some(true),
                Some(false),
                Some(false),
                Some(true),
                Some(false),
                Some(true)
            ]
        );
        assert_eq!(
            summary,
            CleaningSummary {
                catalog_countries: 2,
                window_days: 3,
                grid_rows: 6,
                observation_groups: 3,
                rejected_duplicate_groups: 0,
                rejected_duplicate_rows: 0,
                matched_rows: 3,
                filler_rows: 3,
            }
        );
    }

    #[test]
    fn test_filler_rows_have_zero_metrics_and_null_level() {
        let raw = dataset(&[row("2020-01-01", "US").confirmed(Some(7))]);

        let (cleaned, _) = DataCleaner::clean(&raw, &config("2020-01-01", "2020-01-02")).unwrap();

        assert_eq!(ints(&cleaned, NEW_CONFIRMED), vec![Some(7), Some(0)]);
        assert_eq!(ints(&cleaned, AGGREGATION_LEVEL), vec![Some(0), None]);
        assert_eq!(ints(&cleaned, POPULATION), vec![Some(1_000), Some(1_000)]);
        let stringency = cleaned.column(STRINGENCY_INDEX).unwrap().get(1).unwrap();
        assert_eq!(stringency.extract::<f64>(), Some(0.0));
    }

    #[test]
    fn test_duplicated_key_becomes_filler() {
        let raw = dataset(&[
            row("2020-01-01", "US").confirmed(Some(5)),
            row("2020-01-01", "US").confirmed(Some(6)),
        ]);

        let (cleaned, summary) = DataCleaner::clean(&raw, &config("2020-01-01", "2020-01-01")).unwrap();

        assert_eq!(cleaned.height(), 1);
        assert_eq!(bools(&cleaned, RECORD_EXISTS), vec![Some(false)]);
        assert_eq!(ints(&cleaned, NEW_CONFIRMED), vec![Some(0)]);
        assert_eq!(summary.rejected_duplicate_groups, 1);
        assert_eq!(summary.rejected_duplicate_rows, 2);
    }

    #[test]
    fn test_population_is_stable_per_country() {
        let raw = dataset(&[
            row("2020-01-02", "US").population(Some(331)),
            row("2020-01-01", "US").population(Some(330)),
        ]);

        let (cleaned, _) = DataCleaner::clean(&raw, &config("2020-01-01", "2020-01-02")).unwrap();

        assert_eq!(ints(&cleaned, POPULATION), vec![Some(330), Some(330)]);
    }

    #[test]
    fn test_clean_without_countries_is_empty() {
        let raw = dataset(&[row("2020-01-01", "US_CA")]);

        let (cleaned, summary) = DataCleaner::clean(&raw, &config("2020-01-01", "2020-01-05")).unwrap();

        assert_eq!(cleaned.height(), 0);
        assert_eq!(cleaned.width(), CLEANED_COLUMNS.len());
        assert_eq!(summary.grid_rows, 0);
        assert_eq!(summary.window_days, 5);
    }

    #[test]
    fn test_failed_step_keeps_cleaning_code_and_names_step() {
        let failed: PolarsResult<DataFrame> =
            Err(PolarsError::ComputeError("join keys differ".into()));

        let err = failed
            .map_err(cleaning_failed)
            .context("dense join")
            .unwrap_err();

        assert_eq!(err.error_code(), "CLEANING_FAILED");
        assert!(err.to_string().starts_with("dense join: "));
        assert!(err.to_string().contains("join keys differ"));
    }
}
