//! Dense date × country grid.

use crate::config::DateWindow;
use crate::schema::DATE;
use crate::utils::date_series;
use polars::prelude::*;

/// Every day of `window` crossed with every catalog row, date-major.
///
/// The catalog columns are repeated once per day through a gather, so the
/// grid carries `location_key`, `country_name` and `population` exactly as
/// resolved. Height is `window.day_count() * catalog.height()`.
pub(crate) fn build_grid(catalog: &DataFrame, window: &DateWindow) -> PolarsResult<DataFrame> {
    let countries = catalog.height();
    let capacity = window.day_count() * countries;

    let mut dates = Vec::with_capacity(capacity);
    let mut indices: Vec<IdxSize> = Vec::with_capacity(capacity);
    for day in window.days() {
        for idx in 0..countries {
            dates.push(day);
            indices.push(idx as IdxSize);
        }
    }

    let indices = IdxCa::from_vec("idx".into(), indices);
    let mut grid = catalog.take(&indices)?;
    grid.insert_column(0, date_series(DATE, &dates)?)?;
    Ok(grid)
}
