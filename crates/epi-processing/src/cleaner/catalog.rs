//! Country catalog resolution.

use crate::config::DateWindow;
use crate::loader::RawDataset;
use crate::schema::{COUNTRY_NAME, DATE, LOCATION_KEY, POPULATION};
use crate::scope;
use polars::prelude::*;

/// One row per country that has at least one population value in the
/// window: `location_key`, `country_name`, `population`, sorted by key.
///
/// Population is taken from the earliest dated row; rows sharing that date
/// keep their input order. The name is the first non-null one in date
/// order, so a country whose early rows lack a name still gets one.
pub(crate) fn resolve_catalog(raw: &RawDataset, window: &DateWindow) -> PolarsResult<DataFrame> {
    raw.lazy()
        .filter(scope::country_scope(window).and(scope::has_population()))
        .sort_by_exprs(
            [col(DATE)],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .group_by([col(LOCATION_KEY)])
        .agg([
            col(COUNTRY_NAME).drop_nulls().first().alias(COUNTRY_NAME),
            col(POPULATION).first().alias(POPULATION),
        ])
        .sort_by_exprs([col(LOCATION_KEY)], SortMultipleOptions::default())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dataset, row, window};

    fn strings(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
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

    #[test]
    fn test_catalog_takes_earliest_population() {
        let raw = dataset(&[
            row("2020-01-03", "US").population(Some(300)),
            row("2020-01-01", "US").population(None),
            row("2020-01-02", "US").population(Some(200)),
            row("2020-01-02", "US").population(Some(250)),
        ]);

        let catalog = resolve_catalog(&raw, &window("2020-01-01", "2020-01-03")).unwrap();

        assert_eq!(catalog.height(), 1);
        assert_eq!(ints(&catalog, POPULATION), vec![Some(200)]);
    }

    #[test]
    fn test_catalog_excludes_countries_without_population() {
        let raw = dataset(&[
            row("2020-01-01", "US"),
            row("2020-01-01", "FR").population(None),
            row("2020-01-01", "US_CA"),
            row("2020-01-01", "BR").level(1),
            row("2019-12-31", "DE"),
        ]);

        let catalog = resolve_catalog(&raw, &window("2020-01-01", "2020-01-03")).unwrap();

        assert_eq!(strings(&catalog, LOCATION_KEY), vec![Some("US".to_string())]);
    }

    #[test]
    fn test_catalog_sorted_with_first_non_null_name() {
        let raw = dataset(&[
            row("2020-01-02", "US").name(Some("United States")),
            row("2020-01-01", "US").name(None),
            row("2020-01-01", "AR").name(Some("Argentina")),
        ]);

        let catalog = resolve_catalog(&raw, &window("2020-01-01", "2020-01-03")).unwrap();

        assert_eq!(
            strings(&catalog, LOCATION_KEY),
            vec![Some("AR".to_string()), Some("US".to_string())]
        );
        assert_eq!(
            strings(&catalog, COUNTRY_NAME),
            vec![Some("Argentina".to_string()), Some("United States".to_string())]
        );
    }
}
