use crate::config::{DateWindow, PipelineConfig};
use crate::error::{PipelineError, Result, ResultExt};
use crate::loader::RawDataset;
use crate::schema::*;
use crate::scope;
use crate::types::{
    ColumnNullCount, CoverageAudit, DuplicateAudit, MetadataAudit, NegativeValueAudit,
    NullAudit, OutlierAudit, QualityReport,
};
use crate::utils::{scalar_f64, scalar_i64, scalar_u64};
use polars::prelude::*;
use tracing::{debug, info, warn};

pub struct DataQualityAnalyzer;

impl DataQualityAnalyzer {
    /// Run the six sub-audits and combine them into one report.
    ///
    /// Each audit reduces the in-scope rows to a single summary row; the
    /// rows are then placed side by side. An audit that does not reduce to
    /// exactly one row fails the whole check.
    pub fn analyze(raw: &RawDataset, config: &PipelineConfig) -> Result<QualityReport> {
        let window = config.window();

        let audits = vec![
            ("null", Self::null_audit(raw, &window)),
            ("negative", Self::negative_value_audit(raw, &window)),
            ("duplicate", Self::duplicate_audit(raw, &window)),
            (
                "outlier",
                Self::outlier_audit(
                    raw,
                    &window,
                    config.max_confirmed_cap,
                    config.max_deceased_cap,
                ),
            ),
            (
                "coverage",
                Self::coverage_audit(raw, &window, config.expected_day_count()),
            ),
            ("metadata", Self::metadata_audit(raw, &window)),
        ];

        let mut frames = Vec::with_capacity(audits.len());
        for (name, audit) in audits {
            let frame = audit
                .collect()
                .map_err(|e| PipelineError::QualityCheckFailed(e.to_string()))
                .context(format!("{} audit", name))?;
            debug!("{} audit: {:?}", name, frame);
            frames.push((name, frame));
        }

        let combined = Self::combine_audits(frames)?;
        let report = Self::extract_report(&combined, config)?;

        info!(
            "Quality check: {} negative values, {} duplicate rows, {} countries with gaps",
            report.negatives.total(),
            report.duplicates.duplicate_rows,
            report.coverage.countries_with_gaps
        );
        if report.duplicates.duplicated_keys > 0 {
            warn!(
                "{} (date, location_key) keys occur more than once",
                report.duplicates.duplicated_keys
            );
        }
        if report.coverage.countries_with_gaps > 0 {
            warn!(
                "{} of {} countries do not cover all {} days of the window",
                report.coverage.countries_with_gaps,
                report.coverage.countries_evaluated,
                report.coverage.expected_days
            );
        }

        Ok(report)
    }

    /// Place single-row audit frames side by side.
    fn combine_audits(audits: Vec<(&str, DataFrame)>) -> Result<DataFrame> {
        let mut combined: Option<DataFrame> = None;

        for (name, frame) in audits {
            if frame.height() != 1 {
                return Err(PipelineError::QualityCheckFailed(format!(
                    "{} audit produced {} rows, expected exactly one",
                    name,
                    frame.height()
                )));
            }
            combined = Some(match combined {
                None => frame,
                Some(acc) => acc
                    .hstack(frame.get_columns())
                    .map_err(|e| PipelineError::QualityCheckFailed(e.to_string()))?,
            });
        }

        combined.ok_or_else(|| PipelineError::QualityCheckFailed("no audits to combine".into()))
    }

    // ==================== Audit frames ====================

    fn null_audit(raw: &RawDataset, window: &DateWindow) -> LazyFrame {
        let mut exprs = vec![len().alias("null_total_rows")];
        exprs.extend(
            NULL_AUDIT_COLUMNS
                .iter()
                .map(|name| col(*name).null_count().alias(format!("null_{}", name))),
        );
        raw.in_scope(window).select(exprs)
    }

    fn negative_value_audit(raw: &RawDataset, window: &DateWindow) -> LazyFrame {
        let mut exprs: Vec<Expr> = COUNT_METRICS
            .iter()
            .map(|name| {
                col(*name)
                    .lt(lit(0i64))
                    .sum()
                    .alias(format!("negative_{}", name))
            })
            .collect();
        exprs.push(col(NEW_CONFIRMED).min().alias("min_new_confirmed"));
        exprs.push(col(NEW_DECEASED).min().alias("min_new_deceased"));
        raw.in_scope(window).select(exprs)
    }

    fn duplicate_audit(raw: &RawDataset, window: &DateWindow) -> LazyFrame {
        raw.in_scope(window)
            .group_by([col(DATE), col(LOCATION_KEY)])
            .agg([len().alias("rows")])
            .select([
                col("rows").sum().alias("dup_total_rows"),
                len().alias("dup_distinct_keys"),
                col("rows").gt(lit(1)).sum().alias("dup_duplicated_keys"),
            ])
    }

    fn outlier_audit(
        raw: &RawDataset,
        window: &DateWindow,
        confirmed_cap: i64,
        deceased_cap: i64,
    ) -> LazyFrame {
        let mut exprs: Vec<Expr> = COUNT_METRICS
            .iter()
            .map(|name| col(*name).max().alias(format!("max_{}", name)))
            .collect();
        exprs.push(
            col(NEW_CONFIRMED)
                .gt(lit(confirmed_cap))
                .sum()
                .alias("confirmed_above_cap"),
        );
        exprs.push(
            col(NEW_DECEASED)
                .gt(lit(deceased_cap))
                .sum()
                .alias("deceased_above_cap"),
        );
        raw.in_scope(window)
            .filter(scope::is_country_level())
            .select(exprs)
    }

    fn coverage_audit(raw: &RawDataset, window: &DateWindow, expected_days: usize) -> LazyFrame {
        let expected = expected_days as i64;
        raw.lazy()
            .filter(scope::country_scope(window))
            .group_by([col(LOCATION_KEY)])
            .agg([col(DATE).n_unique().alias("observed_days")])
            .with_column(
                (lit(expected) - col("observed_days").cast(DataType::Int64)).alias("missing_days"),
            )
            .select([
                len().alias("coverage_countries"),
                col("missing_days")
                    .gt(lit(0i64))
                    .sum()
                    .alias("coverage_with_gaps"),
                col("missing_days")
                    .cast(DataType::Float64)
                    .mean()
                    .alias("coverage_avg_missing"),
            ])
    }

    fn metadata_audit(raw: &RawDataset, window: &DateWindow) -> LazyFrame {
        raw.lazy()
            .filter(scope::country_scope(window))
            .group_by([col(LOCATION_KEY)])
            .agg([col(POPULATION).count().alias("population_values")])
            .select([
                len().alias("meta_country_keys"),
                col("population_values")
                    .gt(lit(0))
                    .sum()
                    .alias("meta_with_population"),
            ])
    }

    // ==================== Typed extraction ====================

    fn extract_report(combined: &DataFrame, config: &PipelineConfig) -> Result<QualityReport> {
        let total_rows = scalar_u64(combined, "null_total_rows")?;
        let mut columns = Vec::with_capacity(NULL_AUDIT_COLUMNS.len());
        for name in NULL_AUDIT_COLUMNS {
            let null_count = scalar_u64(combined, &format!("null_{}", name))?;
            let null_percentage = if total_rows > 0 {
                (null_count as f64 / total_rows as f64) * 100.0
            } else {
                0.0
            };
            columns.push(ColumnNullCount {
                column: name.to_string(),
                null_count,
                null_percentage,
            });
        }

        let negatives = NegativeValueAudit {
            negative_new_confirmed: scalar_u64(combined, "negative_new_confirmed")?,
            negative_new_deceased: scalar_u64(combined, "negative_new_deceased")?,
            negative_cumulative_confirmed: scalar_u64(combined, "negative_cumulative_confirmed")?,
            negative_new_persons_vaccinated: scalar_u64(
                combined,
                "negative_new_persons_vaccinated",
            )?,
            min_new_confirmed: scalar_i64(combined, "min_new_confirmed")?,
            min_new_deceased: scalar_i64(combined, "min_new_deceased")?,
        };

        let dup_total_rows = scalar_u64(combined, "dup_total_rows")?;
        let distinct_keys = scalar_u64(combined, "dup_distinct_keys")?;
        let duplicates = DuplicateAudit {
            total_rows: dup_total_rows,
            distinct_keys,
            duplicate_rows: dup_total_rows.saturating_sub(distinct_keys),
            duplicated_keys: scalar_u64(combined, "dup_duplicated_keys")?,
        };

        let outliers = OutlierAudit {
            max_new_confirmed: scalar_i64(combined, "max_new_confirmed")?,
            max_new_deceased: scalar_i64(combined, "max_new_deceased")?,
            max_cumulative_confirmed: scalar_i64(combined, "max_cumulative_confirmed")?,
            max_new_persons_vaccinated: scalar_i64(combined, "max_new_persons_vaccinated")?,
            confirmed_cap: config.max_confirmed_cap,
            deceased_cap: config.max_deceased_cap,
            confirmed_above_cap: scalar_u64(combined, "confirmed_above_cap")?,
            deceased_above_cap: scalar_u64(combined, "deceased_above_cap")?,
        };

        let coverage = CoverageAudit {
            expected_days: config.expected_day_count() as u64,
            countries_evaluated: scalar_u64(combined, "coverage_countries")?,
            countries_with_gaps: scalar_u64(combined, "coverage_with_gaps")?,
            avg_missing_days: scalar_f64(combined, "coverage_avg_missing")?,
        };

        let metadata = MetadataAudit {
            country_keys: scalar_u64(combined, "meta_country_keys")?,
            countries_with_population: scalar_u64(combined, "meta_with_population")?,
        };

        Ok(QualityReport {
            nulls: NullAudit {
                total_rows,
                columns,
            },
            negatives,
            duplicates,
            outliers,
            coverage,
            metadata,
        })
    }
}
