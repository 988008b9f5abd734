//! Volume and coverage profiling of the raw dataset.
//!
//! The profiler answers "how much data is there" before anyone asks "how
//! good is it": row counts, the observed date range, distinct dates and
//! locations, and the split between country and sub-national rows. All
//! figures are computed in one lazy aggregation over the in-scope rows.

use crate::config::DateWindow;
use crate::error::{PipelineError, Result, ResultExt};
use crate::loader::RawDataset;
use crate::schema::{AGGREGATION_LEVEL, DATE, IS_COUNTRY_KEY, LOCATION_KEY};
use crate::types::DatasetProfile;
use crate::utils::{scalar_date, scalar_u64};
use polars::prelude::*;
use tracing::{debug, info};

/// Data profiler for the raw observation table.
pub struct DataProfiler;

impl DataProfiler {
    /// Profile the rows inside `window` that carry a `location_key`.
    ///
    /// Never fails on data content: an empty scope yields zero counts and
    /// `None` dates. Errors only surface from the dataframe engine itself.
    pub fn profile(raw: &RawDataset, window: &DateWindow) -> Result<DatasetProfile> {
        let summary = raw
            .in_scope(window)
            .select([
                len().alias("total_rows"),
                col(DATE).min().alias("min_date"),
                col(DATE).max().alias("max_date"),
                col(DATE).n_unique().alias("distinct_dates"),
                col(LOCATION_KEY)
                    .approx_n_unique()
                    .alias("approx_location_keys"),
                col(LOCATION_KEY)
                    .filter(col(IS_COUNTRY_KEY))
                    .n_unique()
                    .alias("country_keys"),
                col(AGGREGATION_LEVEL)
                    .eq(lit(0i64))
                    .sum()
                    .alias("country_level_rows"),
                col(AGGREGATION_LEVEL)
                    .gt(lit(0i64))
                    .sum()
                    .alias("subnational_rows"),
            ])
            .collect()
            .map_err(|e| PipelineError::ProfilingFailed(e.to_string()))
            .context("window summary")?;
        debug!("Profile summary row: {:?}", summary);

        let total_rows = scalar_u64(&summary, "total_rows")?;
        let profile = DatasetProfile {
            window: *window,
            total_rows,
            // An empty scope has no meaningful distinct counts.
            min_date: scalar_date(&summary, "min_date")?,
            max_date: scalar_date(&summary, "max_date")?,
            distinct_dates: if total_rows == 0 {
                0
            } else {
                scalar_u64(&summary, "distinct_dates")?
            },
            approx_location_keys: if total_rows == 0 {
                0
            } else {
                scalar_u64(&summary, "approx_location_keys")?
            },
            country_keys: scalar_u64(&summary, "country_keys")?,
            country_level_rows: scalar_u64(&summary, "country_level_rows")?,
            subnational_rows: scalar_u64(&summary, "subnational_rows")?,
        };

        info!(
            "Profiled {} rows: {} dates, ~{} locations, {} countries",
            profile.total_rows,
            profile.distinct_dates,
            profile.approx_location_keys,
            profile.country_keys
        );

        Ok(profile)
    }
}
