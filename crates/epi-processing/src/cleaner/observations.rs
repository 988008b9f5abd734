//! Observation aggregation and sanitization.
//!
//! Raw country rows are grouped by (date, location_key, aggregation_level).
//! Within a group, values outside their plausible range contribute zero
//! instead of being passed through. Groups backed by more than one raw row
//! are rejected whole: duplicated keys are dropped, never merged.

use crate::config::DateWindow;
use crate::loader::RawDataset;
use crate::schema::*;
use crate::scope;
use crate::utils::scalar_u64;
use polars::prelude::*;

const RAW_ROWS: &str = "raw_rows";

/// Sanitized observations plus what duplicate rejection removed.
#[derive(Debug, Clone)]
pub(crate) struct Observations {
    /// One row per surviving key with the sanitized metrics and
    /// `record_exists = true`.
    pub frame: DataFrame,
    pub rejected_groups: usize,
    pub rejected_rows: usize,
}

/// Sum of `name` over values inside `[min, max]`; anything else counts 0.
fn clamped_sum(name: &str, min: i64, max: Option<i64>) -> Expr {
    let mut in_range = col(name).gt_eq(lit(min));
    if let Some(max) = max {
        in_range = in_range.and(col(name).lt_eq(lit(max)));
    }
    when(in_range)
        .then(col(name))
        .otherwise(lit(0i64))
        .sum()
        .alias(name)
}

pub(crate) fn sanitize_observations(
    raw: &RawDataset,
    window: &DateWindow,
    confirmed_cap: i64,
    deceased_cap: i64,
) -> PolarsResult<Observations> {
    let grouped = raw
        .lazy()
        .filter(scope::country_scope(window))
        .group_by([col(DATE), col(LOCATION_KEY), col(AGGREGATION_LEVEL)])
        .agg([
            len().alias(RAW_ROWS),
            clamped_sum(NEW_CONFIRMED, 0, Some(confirmed_cap)),
            clamped_sum(NEW_DECEASED, 0, Some(deceased_cap)),
            clamped_sum(CUMULATIVE_CONFIRMED, 0, None),
            clamped_sum(NEW_PERSONS_VACCINATED, 0, None),
            col(STRINGENCY_INDEX)
                .fill_null(lit(0.0))
                .mean()
                .alias(STRINGENCY_INDEX),
        ])
        .collect()?;

    let rejected = grouped
        .clone()
        .lazy()
        .filter(col(RAW_ROWS).gt(lit(1)))
        .select([
            len().alias("groups"),
            col(RAW_ROWS).sum().alias("rows"),
        ])
        .collect()?;

    let frame = grouped
        .lazy()
        .filter(col(RAW_ROWS).eq(lit(1)))
        .select([
            col(DATE),
            col(LOCATION_KEY),
            col(AGGREGATION_LEVEL),
            col(NEW_CONFIRMED),
            col(NEW_DECEASED),
            col(CUMULATIVE_CONFIRMED),
            col(NEW_PERSONS_VACCINATED),
            col(STRINGENCY_INDEX),
            lit(true).alias(RECORD_EXISTS),
        ])
        .collect()?;

    Ok(Observations {
        frame,
        rejected_groups: scalar_u64(&rejected, "groups")? as usize,
        rejected_rows: scalar_u64(&rejected, "rows")? as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dataset, row, window};

    fn value(obs: &Observations, key: &str, name: &str) -> Option<i64> {
        let filtered = obs
            .frame
            .clone()
            .lazy()
            .filter(col(LOCATION_KEY).eq(lit(key)))
            .select([col(name).cast(DataType::Int64)])
            .collect()
            .unwrap();
        assert_eq!(filtered.height(), 1, "expected one row for {}", key);
        crate::utils::scalar_i64(&filtered, name).unwrap()
    }

    #[test]
    fn test_caps_and_negative_values_contribute_zero() {
        let raw = dataset(&[
            row("2020-01-01", "US")
                .confirmed(Some(500_000))
                .deceased(Some(10_000))
                .cumulative(Some(-4))
                .vaccinated(None),
            row("2020-01-01", "FR")
                .confirmed(Some(-3))
                .deceased(Some(10_001))
                .cumulative(Some(9_000_000))
                .vaccinated(Some(123_456_789)),
        ]);

        let obs = sanitize_observations(&raw, &window("2020-01-01", "2020-01-01"), 400_000, 10_000)
            .unwrap();

        assert_eq!(obs.frame.height(), 2);
        assert_eq!(value(&obs, "US", NEW_CONFIRMED), Some(0));
        assert_eq!(value(&obs, "US", NEW_DECEASED), Some(10_000));
        assert_eq!(value(&obs, "US", CUMULATIVE_CONFIRMED), Some(0));
        assert_eq!(value(&obs, "US", NEW_PERSONS_VACCINATED), Some(0));
        assert_eq!(value(&obs, "FR", NEW_CONFIRMED), Some(0));
        assert_eq!(value(&obs, "FR", NEW_DECEASED), Some(0));
        assert_eq!(value(&obs, "FR", CUMULATIVE_CONFIRMED), Some(9_000_000));
        assert_eq!(value(&obs, "FR", NEW_PERSONS_VACCINATED), Some(123_456_789));
    }

    #[test]
    fn test_cap_is_inclusive() {
        let raw = dataset(&[row("2020-01-01", "US").confirmed(Some(400_000))]);

        let obs = sanitize_observations(&raw, &window("2020-01-01", "2020-01-01"), 400_000, 10_000)
            .unwrap();

        assert_eq!(value(&obs, "US", NEW_CONFIRMED), Some(400_000));
    }

    #[test]
    fn test_null_stringency_counts_as_zero() {
        let raw = dataset(&[row("2020-01-01", "US").stringency(None)]);

        let obs = sanitize_observations(&raw, &window("2020-01-01", "2020-01-01"), 400_000, 10_000)
            .unwrap();

        let stringency = obs.frame.column(STRINGENCY_INDEX).unwrap().get(0).unwrap();
        assert_eq!(stringency.extract::<f64>(), Some(0.0));
    }

    #[test]
    fn test_duplicate_groups_are_rejected() {
        let raw = dataset(&[
            row("2020-01-01", "US").confirmed(Some(10)),
            row("2020-01-01", "US").confirmed(Some(20)),
            row("2020-01-01", "US").confirmed(Some(30)),
            row("2020-01-02", "US").confirmed(Some(40)),
            row("2020-01-01", "FR"),
            row("2020-01-01", "FR"),
        ]);

        let obs = sanitize_observations(&raw, &window("2020-01-01", "2020-01-02"), 400_000, 10_000)
            .unwrap();

        assert_eq!(obs.frame.height(), 1);
        assert_eq!(value(&obs, "US", NEW_CONFIRMED), Some(40));
        assert_eq!(obs.rejected_groups, 2);
        assert_eq!(obs.rejected_rows, 5);
    }

    #[test]
    fn test_only_country_rows_in_window() {
        let raw = dataset(&[
            row("2020-01-01", "US_CA"),
            row("2020-01-01", "GB").level(1),
            row("2019-12-31", "US"),
            row("2020-01-01", "US").without_date(),
            row("2020-01-01", "DE"),
        ]);

        let obs = sanitize_observations(&raw, &window("2020-01-01", "2020-01-01"), 400_000, 10_000)
            .unwrap();

        assert_eq!(obs.frame.height(), 1);
        assert_eq!(obs.rejected_groups, 0);
        assert_eq!(obs.rejected_rows, 0);
    }
}
