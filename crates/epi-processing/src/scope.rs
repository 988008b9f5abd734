//! Named row predicates shared by the profiler, quality checker and cleaner.
//!
//! Every component filters the raw table with the same building blocks so
//! that "in scope" means one thing across the whole run.

use crate::config::DateWindow;
use crate::schema::{AGGREGATION_LEVEL, DATE, IS_COUNTRY_KEY, LOCATION_KEY, POPULATION};
use polars::prelude::*;

/// `date` lies inside the inclusive window. Null dates never match.
pub fn in_window(window: &DateWindow) -> Expr {
    col(DATE)
        .gt_eq(lit(window.start))
        .and(col(DATE).lt_eq(lit(window.end)))
}

pub fn has_location_key() -> Expr {
    col(LOCATION_KEY).is_not_null()
}

pub fn has_date() -> Expr {
    col(DATE).is_not_null()
}

/// `location_key` is exactly two uppercase letters.
pub fn is_country_key() -> Expr {
    col(IS_COUNTRY_KEY)
}

pub fn is_country_level() -> Expr {
    col(AGGREGATION_LEVEL).eq(lit(0i64))
}

pub fn has_population() -> Expr {
    col(POPULATION).is_not_null()
}

/// Rows the profiler and the null/negative/duplicate audits look at.
pub fn profile_scope(window: &DateWindow) -> Expr {
    has_date()
        .and(in_window(window))
        .and(has_location_key())
}

/// Country-level rows inside the window.
pub fn country_scope(window: &DateWindow) -> Expr {
    profile_scope(window)
        .and(is_country_key())
        .and(is_country_level())
}
