//! Shared utilities for the cleaning pipeline.
//!
//! This module contains the country-key pattern, date conversions between
//! chrono and polars' physical `Date` representation, and helpers for
//! reading scalars out of the single-row frames the audits produce.

use crate::schema::IS_COUNTRY_KEY;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

// =============================================================================
// Location Keys
// =============================================================================

/// Two uppercase ASCII letters, e.g. `US`, `DE`. Anything else (`US_CA`,
/// `us`, `USA`) is a sub-national or malformed key.
static COUNTRY_KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}$").expect("Invalid regex: country key"));

/// Whether `key` is a country-level location key.
///
/// # Example
///
/// ```rust,ignore
/// use epi_processing::utils::is_country_key;
///
/// assert!(is_country_key("BR"));
/// assert!(!is_country_key("BR_SP"));
/// ```
pub fn is_country_key(key: &str) -> bool {
    COUNTRY_KEY_PATTERN.is_match(key)
}

/// Boolean column named [`IS_COUNTRY_KEY`], `false` for null keys.
pub fn country_key_mask(keys: &Column) -> PolarsResult<Column> {
    let keys = keys.as_materialized_series().str()?;
    let mask: Vec<bool> = keys
        .into_iter()
        .map(|key| key.is_some_and(is_country_key))
        .collect();
    Ok(Column::from(Series::new(IS_COUNTRY_KEY.into(), mask)))
}

// =============================================================================
// Dates
// =============================================================================

const UNIX_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1970, 1, 1) {
    Some(date) => date,
    None => panic!("invalid epoch"),
};

/// Days since 1970-01-01, polars' physical encoding of `Date`.
pub fn date_to_days(date: NaiveDate) -> PolarsResult<i32> {
    i32::try_from((date - UNIX_EPOCH).num_days()).map_err(|_| {
        PolarsError::ComputeError(format!("date {} does not fit a Date column", date).into())
    })
}

/// Inverse of [`date_to_days`].
pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    UNIX_EPOCH.checked_add_signed(chrono::TimeDelta::days(i64::from(days)))
}

/// Build a `Date` series from chrono dates.
pub fn date_series(name: &str, dates: &[NaiveDate]) -> PolarsResult<Series> {
    let days = dates
        .iter()
        .copied()
        .map(date_to_days)
        .collect::<PolarsResult<Vec<i32>>>()?;
    Series::new(name.into(), days).cast(&DataType::Date)
}

// =============================================================================
// Scalar Extraction
// =============================================================================

fn first_value<'a>(df: &'a DataFrame, name: &str) -> PolarsResult<AnyValue<'a>> {
    let column = df.column(name)?;
    if column.is_empty() {
        return Ok(AnyValue::Null);
    }
    column.get(0)
}

/// Unsigned count from row 0 of `name`; null reads as 0.
pub fn scalar_u64(df: &DataFrame, name: &str) -> PolarsResult<u64> {
    Ok(first_value(df, name)?.extract::<u64>().unwrap_or(0))
}

/// Signed integer from row 0 of `name`; null reads as `None`.
pub fn scalar_i64(df: &DataFrame, name: &str) -> PolarsResult<Option<i64>> {
    Ok(first_value(df, name)?.extract::<i64>())
}

/// Float from row 0 of `name`; null reads as `None`.
pub fn scalar_f64(df: &DataFrame, name: &str) -> PolarsResult<Option<f64>> {
    Ok(first_value(df, name)?.extract::<f64>())
}

/// Date from row 0 of `name`; null reads as `None`.
pub fn scalar_date(df: &DataFrame, name: &str) -> PolarsResult<Option<NaiveDate>> {
    match first_value(df, name)? {
        AnyValue::Null => Ok(None),
        AnyValue::Date(days) => Ok(days_to_date(days)),
        other => polars_bail!(
            ComputeError: "expected a date in column '{}', found {:?}", name, other
        ),
    }
}
