//! Raw-row builders shared by the unit tests.

use crate::config::DateWindow;
use crate::loader::RawDataset;
use crate::schema::*;
use crate::utils::is_country_key;
use chrono::NaiveDate;
use polars::prelude::*;

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub(crate) fn window(start: &str, end: &str) -> DateWindow {
    DateWindow::new(date(start), date(end)).unwrap()
}

/// One raw observation. Defaults describe a clean country-level row.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    date: Option<String>,
    key: Option<String>,
    level: Option<i64>,
    name: Option<String>,
    population: Option<i64>,
    new_confirmed: Option<i64>,
    new_deceased: Option<i64>,
    cumulative_confirmed: Option<i64>,
    new_persons_vaccinated: Option<i64>,
    stringency_index: Option<f64>,
}

pub(crate) fn row(date: &str, key: &str) -> Row {
    Row {
        date: Some(date.to_string()),
        key: Some(key.to_string()),
        level: Some(if is_country_key(key) { 0 } else { 1 }),
        name: Some(format!("Country {}", key)),
        population: Some(1_000),
        new_confirmed: Some(1),
        new_deceased: Some(0),
        cumulative_confirmed: Some(1),
        new_persons_vaccinated: Some(0),
        stringency_index: Some(10.0),
    }
}

impl Row {
    pub(crate) fn without_date(mut self) -> Self {
        self.date = None;
        self
    }

    pub(crate) fn without_key(mut self) -> Self {
        self.key = None;
        self
    }

    pub(crate) fn level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub(crate) fn name(mut self, name: Option<&str>) -> Self {
        self.name = name.map(str::to_string);
        self
    }

    pub(crate) fn population(mut self, population: Option<i64>) -> Self {
        self.population = population;
        self
    }

    pub(crate) fn confirmed(mut self, value: Option<i64>) -> Self {
        self.new_confirmed = value;
        self
    }

    pub(crate) fn deceased(mut self, value: Option<i64>) -> Self {
        self.new_deceased = value;
        self
    }

    pub(crate) fn cumulative(mut self, value: Option<i64>) -> Self {
        self.cumulative_confirmed = value;
        self
    }

    pub(crate) fn vaccinated(mut self, value: Option<i64>) -> Self {
        self.new_persons_vaccinated = value;
        self
    }

    pub(crate) fn stringency(mut self, value: Option<f64>) -> Self {
        self.stringency_index = value;
        self
    }
}

pub(crate) fn frame(rows: &[Row]) -> DataFrame {
    fn strings(rows: &[Row], f: impl Fn(&Row) -> Option<String>) -> Vec<Option<String>> {
        rows.iter().map(f).collect()
    }
    fn ints(rows: &[Row], f: impl Fn(&Row) -> Option<i64>) -> Vec<Option<i64>> {
        rows.iter().map(f).collect()
    }

    let stringency: Vec<Option<f64>> = rows.iter().map(|r| r.stringency_index).collect();
    DataFrame::new(vec![
        Column::new(DATE.into(), strings(rows, |r| r.date.clone())),
        Column::new(LOCATION_KEY.into(), strings(rows, |r| r.key.clone())),
        Column::new(AGGREGATION_LEVEL.into(), ints(rows, |r| r.level)),
        Column::new(COUNTRY_NAME.into(), strings(rows, |r| r.name.clone())),
        Column::new(POPULATION.into(), ints(rows, |r| r.population)),
        Column::new(NEW_CONFIRMED.into(), ints(rows, |r| r.new_confirmed)),
        Column::new(NEW_DECEASED.into(), ints(rows, |r| r.new_deceased)),
        Column::new(
            CUMULATIVE_CONFIRMED.into(),
            ints(rows, |r| r.cumulative_confirmed),
        ),
        Column::new(
            NEW_PERSONS_VACCINATED.into(),
            ints(rows, |r| r.new_persons_vaccinated),
        ),
        Column::new(STRINGENCY_INDEX.into(), stringency),
    ])
    .unwrap()
}

pub(crate) fn dataset(rows: &[Row]) -> RawDataset {
    RawDataset::from_frame(frame(rows)).unwrap()
}
