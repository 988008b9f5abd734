//! Reading the raw observation table and writing the cleaned one.
//!
//! The loader projects exactly the raw columns, normalizes their types and
//! appends the [`IS_COUNTRY_KEY`] flag. The writer replaces the output file
//! atomically: the table is written to a sibling temporary file which is
//! then renamed over the target, so a failed write never leaves a partial
//! output behind.

use crate::config::{DateWindow, OutputFormat};
use crate::error::{PipelineError, Result};
use crate::schema::*;
use crate::scope;
use crate::utils::country_key_mask;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The raw observation table after projection and type normalization.
///
/// Cheap to clone: columns are reference counted. Every stage reads the
/// same snapshot and never mutates it.
#[derive(Debug, Clone)]
pub struct RawDataset {
    frame: DataFrame,
}

impl RawDataset {
    /// Normalize an in-memory frame.
    ///
    /// Extra columns are dropped. A missing raw column is a
    /// [`PipelineError::ColumnNotFound`]. Cells that cannot be cast to the
    /// target type become null.
    pub fn from_frame(df: DataFrame) -> Result<Self> {
        let present = df.get_column_names_str();
        if let Some(missing) = RAW_COLUMNS.iter().find(|name| !present.contains(*name)) {
            return Err(PipelineError::ColumnNotFound(missing.to_string()));
        }

        let date_dtype = df.column(DATE)?.dtype().clone();
        let date_expr = match date_dtype {
            DataType::String => col(DATE).str().to_date(StrptimeOptions {
                format: Some("%Y-%m-%d".into()),
                strict: false,
                ..Default::default()
            }),
            _ => col(DATE).cast(DataType::Date),
        };

        let mut frame = df
            .lazy()
            .select([
                date_expr.alias(DATE),
                col(LOCATION_KEY).cast(DataType::String),
                col(AGGREGATION_LEVEL).cast(DataType::Int64),
                col(COUNTRY_NAME).cast(DataType::String),
                col(POPULATION).cast(DataType::Int64),
                col(NEW_CONFIRMED).cast(DataType::Int64),
                col(NEW_DECEASED).cast(DataType::Int64),
                col(CUMULATIVE_CONFIRMED).cast(DataType::Int64),
                col(NEW_PERSONS_VACCINATED).cast(DataType::Int64),
                col(STRINGENCY_INDEX).cast(DataType::Float64),
            ])
            .collect()?;

        let mask = country_key_mask(frame.column(LOCATION_KEY)?)?;
        frame.with_column(mask)?;

        Ok(Self { frame })
    }

    /// Load a CSV source, falling back to an all-string parse when typed
    /// inference fails.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let df = load_csv_with_fallbacks(path)?;
        info!("Loaded {} raw rows from {}", df.height(), path.display());
        Self::from_frame(df)
    }

    pub fn from_parquet(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PipelineError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let df = ParquetReader::new(file)
            .finish()
            .map_err(|e| PipelineError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        info!("Loaded {} raw rows from {}", df.height(), path.display());
        Self::from_frame(df)
    }

    /// Load by extension: `.parquet`/`.pq` as Parquet, anything else as CSV.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::LoadFailed(format!(
                "input file not found: {}",
                path.display()
            )));
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("parquet") | Some("pq") => Self::from_parquet(path),
            _ => Self::from_csv(path),
        }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn lazy(&self) -> LazyFrame {
        self.frame.clone().lazy()
    }

    /// Rows inside the window with a non-null `location_key`.
    pub fn in_scope(&self, window: &DateWindow) -> LazyFrame {
        self.lazy().filter(scope::profile_scope(window))
    }
}

fn read_csv(path: &Path, infer_types: bool) -> PolarsResult<DataFrame> {
    let options = if infer_types {
        CsvReadOptions::default()
            .with_infer_schema_length(None)
            .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
    } else {
        // Zero inference rows reads every column as String.
        CsvReadOptions::default().with_infer_schema_length(Some(0))
    };
    options
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Load CSV with a typed parse first, then an all-string parse.
pub fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    match read_csv(path, true) {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Typed CSV parse failed, retrying as strings: {}", e);
        }
    }

    read_csv(path, false)
        .map_err(|e| PipelineError::LoadFailed(format!("{}: {}", path.display(), e)))
}

// =============================================================================
// Writer
// =============================================================================

fn temporary_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// A file written beside its target but not yet moved into place.
///
/// Dropping it without [`commit`](Self::commit) deletes the temporary file
/// and leaves the target untouched, so several outputs can be staged and
/// only replaced once every fallible step has succeeded.
#[derive(Debug)]
pub struct StagedFile {
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// Create the parent directories of `target` and fill a sibling
    /// temporary file through `write`.
    pub fn create<F>(target: &Path, write: F) -> PolarsResult<Self>
    where
        F: FnOnce(&mut File) -> PolarsResult<()>,
    {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staged = Self {
            tmp: temporary_path(target),
            target: target.to_path_buf(),
            committed: false,
        };
        let mut file = File::create(&staged.tmp)?;
        write(&mut file)?;
        file.sync_all()?;
        Ok(staged)
    }

    /// The path this file replaces on commit.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the temporary file over the target.
    pub fn commit(mut self) -> std::io::Result<PathBuf> {
        fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.tmp);
        }
    }
}

pub(crate) fn output_write_failed(path: &Path, reason: impl ToString) -> PipelineError {
    PipelineError::OutputWriteFailed {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Write `df` beside `path` without replacing it yet.
pub fn stage_table(df: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<StagedFile> {
    let staged = StagedFile::create(path, |file| {
        match format {
            OutputFormat::Csv => {
                CsvWriter::new(file)
                    .include_header(true)
                    .with_separator(b',')
                    .with_quote_char(b'"')
                    .finish(df)?;
            }
            OutputFormat::Parquet => {
                ParquetWriter::new(file).finish(df)?;
            }
        }
        Ok(())
    })
    .map_err(|e| output_write_failed(path, e))?;
    debug!("Staged {} rows for {}", df.height(), path.display());
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "date,location_key,aggregation_level,country_name,population,\
new_confirmed,new_deceased,cumulative_confirmed,new_persons_vaccinated,stringency_index,extra";

    fn write_csv(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("raw.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", HEADER).unwrap();
        write!(file, "{}", body).unwrap();
        path
    }

    #[test]
    fn test_from_csv_normalizes_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "2020-01-01,US,0,United States,331000000,5,1,5,,12.5,x\n\
             2020-01-01,US_CA,1,United States,331000000,2,0,2,,,y\n",
        );

        let raw = RawDataset::from_csv(&path).unwrap();
        let frame = raw.frame();

        assert_eq!(frame.width(), RAW_COLUMNS.len() + 1);
        assert!(frame.column("extra").is_err());
        assert_eq!(frame.column(DATE).unwrap().dtype(), &DataType::Date);
        assert_eq!(frame.column(POPULATION).unwrap().dtype(), &DataType::Int64);
        assert_eq!(
            frame.column(STRINGENCY_INDEX).unwrap().dtype(),
            &DataType::Float64
        );

        let flags: Vec<Option<bool>> = frame
            .column(IS_COUNTRY_KEY)
            .unwrap()
            .as_materialized_series()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(flags, vec![Some(true), Some(false)]);
    }

    #[test]
    fn test_unparseable_cells_become_null() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "2020-01-01,FR,0,France,67000000,n/a,0,0,0,1.0,\n\
             not-a-date,FR,0,France,67000000,3,0,3,0,1.0,\n",
        );

        let raw = RawDataset::from_path(&path).unwrap();
        let frame = raw.frame();
        assert_eq!(frame.column(NEW_CONFIRMED).unwrap().null_count(), 1);
        assert_eq!(frame.column(DATE).unwrap().null_count(), 1);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let df = df![
            DATE => ["2020-01-01"],
            LOCATION_KEY => ["US"],
        ]
        .unwrap();

        let err = RawDataset::from_frame(df).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
        assert!(err.to_string().contains(AGGREGATION_LEVEL));
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let err = RawDataset::from_path("/definitely/not/here.csv").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_FAILED");
    }

    #[test]
    fn test_committed_stage_replaces_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");

        let mut first = df!["a" => [1i64, 2]].unwrap();
        stage_table(&mut first, &path, OutputFormat::Csv).unwrap().commit().unwrap();
        let mut second = df!["a" => [3i64]].unwrap();
        stage_table(&mut second, &path, OutputFormat::Csv).unwrap().commit().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a\n3\n");
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn test_uncommitted_stage_leaves_target_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "previous\n").unwrap();

        let mut df = df!["a" => [1i64]].unwrap();
        let staged = stage_table(&mut df, &path, OutputFormat::Csv).unwrap();
        assert!(temporary_path(&path).exists());
        drop(staged);

        assert_eq!(fs::read_to_string(&path).unwrap(), "previous\n");
        assert!(!temporary_path(&path).exists());
    }

    #[test]
    fn test_staged_parquet_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut df = df!["a" => [1i64, 2, 3]].unwrap();

        stage_table(&mut df, &path, OutputFormat::Parquet).unwrap().commit().unwrap();

        let read = ParquetReader::new(File::open(&path).unwrap())
            .finish()
            .unwrap();
        assert!(read.equals(&df));
    }

    #[test]
    fn test_stage_into_file_parent_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        File::create(&blocker).unwrap();

        let mut df = df!["a" => [1i64]].unwrap();
        let err = stage_table(&mut df, &blocker.join("out.csv"), OutputFormat::Csv).unwrap_err();
        assert_eq!(err.error_code(), "OUTPUT_WRITE_FAILED");
    }
}
