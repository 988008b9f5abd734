//! Column names of the raw observation and cleaned record tables.

/// Calendar date of the observation.
pub const DATE: &str = "date";
/// Geographic entity identifier. Two uppercase letters denote a country.
pub const LOCATION_KEY: &str = "location_key";
/// 0 for country-level rows, higher for sub-national rows.
pub const AGGREGATION_LEVEL: &str = "aggregation_level";
pub const COUNTRY_NAME: &str = "country_name";
pub const POPULATION: &str = "population";
pub const NEW_CONFIRMED: &str = "new_confirmed";
pub const NEW_DECEASED: &str = "new_deceased";
pub const CUMULATIVE_CONFIRMED: &str = "cumulative_confirmed";
pub const NEW_PERSONS_VACCINATED: &str = "new_persons_vaccinated";
pub const STRINGENCY_INDEX: &str = "stringency_index";

/// Loader-computed flag: `location_key` matches the country-key pattern.
pub const IS_COUNTRY_KEY: &str = "is_country_key";

/// Output flag distinguishing real observations from filler rows.
pub const RECORD_EXISTS: &str = "record_exists";

/// Columns every raw source must provide.
pub const RAW_COLUMNS: [&str; 10] = [
    DATE,
    LOCATION_KEY,
    AGGREGATION_LEVEL,
    COUNTRY_NAME,
    POPULATION,
    NEW_CONFIRMED,
    NEW_DECEASED,
    CUMULATIVE_CONFIRMED,
    NEW_PERSONS_VACCINATED,
    STRINGENCY_INDEX,
];

/// Columns audited for nulls, in report order.
pub const NULL_AUDIT_COLUMNS: [&str; 9] = [
    DATE,
    LOCATION_KEY,
    NEW_CONFIRMED,
    NEW_DECEASED,
    COUNTRY_NAME,
    CUMULATIVE_CONFIRMED,
    POPULATION,
    STRINGENCY_INDEX,
    NEW_PERSONS_VACCINATED,
];

/// Integer daily metrics that must never be negative.
pub const COUNT_METRICS: [&str; 4] = [
    NEW_CONFIRMED,
    NEW_DECEASED,
    CUMULATIVE_CONFIRMED,
    NEW_PERSONS_VACCINATED,
];

/// Cleaned record columns, in output order.
pub const CLEANED_COLUMNS: [&str; 11] = [
    DATE,
    LOCATION_KEY,
    AGGREGATION_LEVEL,
    COUNTRY_NAME,
    POPULATION,
    NEW_CONFIRMED,
    NEW_DECEASED,
    CUMULATIVE_CONFIRMED,
    NEW_PERSONS_VACCINATED,
    STRINGENCY_INDEX,
    RECORD_EXISTS,
];
