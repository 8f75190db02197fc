//! # EMR Data Loading and Validation Module
//!
//! This module is the exclusive entry point for the real-world baseline dataset.
//! It reads a tab-separated EMR extract, validates it against a strict schema,
//! and hands the simulation core an immutable [`EmrTable`].
//!
//! - Strict Schema: Column names are not configurable. The file must contain
//!   `eye_id`, `baseline_va` and `one_year_va`; any other columns are ignored.
//! - User-Centric Errors: Failures are assumed to be user-input errors.
//!   The `DataError` enum is designed to provide clear, actionable feedback.
//! - The simulation core never re-validates. Tables built in memory go through
//!   [`EmrTable::new`], which applies the same checks as the file loader.

use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Lowest valid ETDRS letter score.
pub const MIN_VA: i32 = 0;
/// Highest valid ETDRS letter score.
pub const MAX_VA: i32 = 100;

const EYE_ID_COLUMN: &str = "eye_id";
const BASELINE_VA_COLUMN: &str = "baseline_va";
const ONE_YEAR_VA_COLUMN: &str = "one_year_va";

/// One real eye from the EMR extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EyeRecord {
    pub eye_id: String,
    /// VA at treatment start, in ETDRS letters.
    pub baseline_va: i32,
    /// VA after one year of treatment, in ETDRS letters.
    pub one_year_va: i32,
}

impl EyeRecord {
    pub fn new(eye_id: impl Into<String>, baseline_va: i32, one_year_va: i32) -> Self {
        Self {
            eye_id: eye_id.into(),
            baseline_va,
            one_year_va,
        }
    }
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. This tool requires complete data with no missing values."
    )]
    MissingValuesFound(String),
    #[error(
        "Column '{column_name}' row {row}: {value} is not a whole number of letters between 0 and 100."
    )]
    InvalidVa {
        column_name: String,
        row: usize,
        value: f64,
    },
    #[error("Row {0} has an empty eye identifier.")]
    EmptyEyeId(usize),
    #[error("Eye identifier '{0}' appears more than once. Each eye must be listed exactly once.")]
    DuplicateEyeId(String),
    #[error("The EMR table contains no eyes.")]
    EmptyTable,
}

/// The validated EMR population. Immutable for the life of a simulation run.
#[derive(Debug, Clone)]
pub struct EmrTable {
    records: Vec<EyeRecord>,
}

impl EmrTable {
    /// Validates records built in memory: non-empty, unique non-empty ids, VA in range.
    pub fn new(records: Vec<EyeRecord>) -> Result<Self, DataError> {
        if records.is_empty() {
            return Err(DataError::EmptyTable);
        }
        let mut seen = HashSet::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let row = i + 1;
            if record.eye_id.trim().is_empty() {
                return Err(DataError::EmptyEyeId(row));
            }
            if !seen.insert(record.eye_id.as_str()) {
                return Err(DataError::DuplicateEyeId(record.eye_id.clone()));
            }
            internal::check_va_range(BASELINE_VA_COLUMN, row, record.baseline_va)?;
            internal::check_va_range(ONE_YEAR_VA_COLUMN, row, record.one_year_va)?;
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[EyeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Loads and validates an EMR extract from a tab-separated file.
pub fn load_emr(path: &str) -> Result<EmrTable, DataError> {
    let records = internal::read_records(path)?;
    let table = EmrTable::new(records)?;
    log::info!("Loaded {} eyes from '{}'", table.len(), path);
    Ok(table)
}

/// Internal module for shared data loading logic.
mod internal {
    use super::*;

    pub(super) fn check_va_range(column_name: &str, row: usize, value: i32) -> Result<(), DataError> {
        if !(MIN_VA..=MAX_VA).contains(&value) {
            return Err(DataError::InvalidVa {
                column_name: column_name.to_string(),
                row,
                value: value as f64,
            });
        }
        Ok(())
    }

    /// Extracts a VA column, requiring whole numbers in the valid letter range.
    fn extract_va_column(df: &DataFrame, column_name: &str) -> Result<Vec<i32>, DataError> {
        let series = df.column(column_name)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(column_name.to_string()));
        }

        let casted = match series.cast(&DataType::Float64) {
            Ok(casted) => casted,
            Err(_) => {
                return Err(DataError::ColumnWrongType {
                    column_name: column_name.to_string(),
                    expected_type: "integer letters",
                    found_type: format!("{:?}", series.dtype()),
                });
            }
        };

        // A non-numeric string becomes null under a non-strict cast.
        if casted.null_count() > 0 {
            return Err(DataError::ColumnWrongType {
                column_name: column_name.to_string(),
                expected_type: "integer letters",
                found_type: format!("{:?}", series.dtype()),
            });
        }

        let chunked = casted.f64()?.rechunk();
        let mut values = Vec::with_capacity(chunked.len());
        for (i, value) in chunked.into_no_null_iter().enumerate() {
            let in_range = value.is_finite()
                && value.fract() == 0.0
                && value >= MIN_VA as f64
                && value <= MAX_VA as f64;
            if !in_range {
                return Err(DataError::InvalidVa {
                    column_name: column_name.to_string(),
                    row: i + 1,
                    value,
                });
            }
            values.push(value as i32);
        }
        Ok(values)
    }

    fn extract_id_column(df: &DataFrame) -> Result<Vec<String>, DataError> {
        let series = df.column(EYE_ID_COLUMN)?;
        if series.null_count() > 0 {
            return Err(DataError::MissingValuesFound(EYE_ID_COLUMN.to_string()));
        }
        let casted = series.cast(&DataType::String)?;
        let ids = casted
            .str()?
            .into_no_null_iter()
            .map(|id| id.trim().to_string())
            .collect();
        Ok(ids)
    }

    pub(super) fn read_records(path: &str) -> Result<Vec<EyeRecord>, DataError> {
        log::debug!("Reading EMR extract from '{path}'");

        let df = CsvReader::new(File::open(Path::new(path))?)
            .with_options(
                CsvReadOptions::default()
                    .with_has_header(true)
                    .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
            )
            .finish()?;

        let columns: HashSet<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        for required in [EYE_ID_COLUMN, BASELINE_VA_COLUMN, ONE_YEAR_VA_COLUMN] {
            if !columns.contains(required) {
                return Err(DataError::ColumnNotFound(required.to_string()));
            }
        }

        if df.height() == 0 {
            return Err(DataError::EmptyTable);
        }

        let ids = extract_id_column(&df)?;
        let baseline = extract_va_column(&df, BASELINE_VA_COLUMN)?;
        let one_year = extract_va_column(&df, ONE_YEAR_VA_COLUMN)?;

        Ok(ids
            .into_iter()
            .zip(baseline)
            .zip(one_year)
            .map(|((eye_id, baseline_va), one_year_va)| EyeRecord {
                eye_id,
                baseline_va,
                one_year_va,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    fn create_test_tsv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn test_load_emr_success() {
        let content = "eye_id\tbaseline_va\tone_year_va\tclinic\n\
                       E1\t70\t72\tnorth\n\
                       E2\t55\t60\tnorth\n\
                       E3\t40\t38\tsouth\n\
                       E4\t20\t50\tsouth";
        let file = create_test_tsv(content).unwrap();
        let table = load_emr(file.path().to_str().unwrap()).unwrap();

        assert_eq!(table.len(), 4);
        assert_eq!(table.records()[0], EyeRecord::new("E1", 70, 72));
        assert_eq!(table.records()[3], EyeRecord::new("E4", 20, 50));
    }

    #[test]
    fn test_numeric_ids_are_kept_as_text() {
        let content = "eye_id\tbaseline_va\tone_year_va\n101\t70\t72\n102\t55\t60";
        let file = create_test_tsv(content).unwrap();
        let table = load_emr(file.path().to_str().unwrap()).unwrap();
        assert_eq!(table.records()[0].eye_id, "101");
        assert_eq!(table.records()[1].eye_id, "102");
    }

    #[test]
    fn test_error_column_not_found() {
        let file = create_test_tsv("eye_id\tbaseline_va\nE1\t70").unwrap();
        match load_emr(file.path().to_str().unwrap()).unwrap_err() {
            DataError::ColumnNotFound(col) => assert_eq!(col, "one_year_va"),
            other => panic!("Expected ColumnNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_error_missing_values() {
        let file =
            create_test_tsv("eye_id\tbaseline_va\tone_year_va\nE1\t70\t72\nE2\t\t60").unwrap();
        match load_emr(file.path().to_str().unwrap()).unwrap_err() {
            DataError::MissingValuesFound(col) => assert_eq!(col, "baseline_va"),
            other => panic!("Expected MissingValuesFound, got {other:?}"),
        }
    }

    #[test]
    fn test_error_wrong_type() {
        let file = create_test_tsv("eye_id\tbaseline_va\tone_year_va\nE1\t70\tgood\nE2\t55\t60")
            .unwrap();
        match load_emr(file.path().to_str().unwrap()).unwrap_err() {
            DataError::ColumnWrongType { column_name, .. } => assert_eq!(column_name, "one_year_va"),
            other => panic!("Expected ColumnWrongType, got {other:?}"),
        }
    }

    #[test]
    fn test_error_out_of_range_or_fractional_va() {
        let file = create_test_tsv("eye_id\tbaseline_va\tone_year_va\nE1\t70\t72\nE2\t101\t60")
            .unwrap();
        match load_emr(file.path().to_str().unwrap()).unwrap_err() {
            DataError::InvalidVa { column_name, row, .. } => {
                assert_eq!(column_name, "baseline_va");
                assert_eq!(row, 2);
            }
            other => panic!("Expected InvalidVa, got {other:?}"),
        }

        let file = create_test_tsv("eye_id\tbaseline_va\tone_year_va\nE1\t70\t72.5").unwrap();
        assert!(matches!(
            load_emr(file.path().to_str().unwrap()).unwrap_err(),
            DataError::InvalidVa { .. }
        ));
    }

    #[test]
    fn test_error_duplicate_id() {
        let file = create_test_tsv("eye_id\tbaseline_va\tone_year_va\nE1\t70\t72\nE1\t55\t60")
            .unwrap();
        match load_emr(file.path().to_str().unwrap()).unwrap_err() {
            DataError::DuplicateEyeId(id) => assert_eq!(id, "E1"),
            other => panic!("Expected DuplicateEyeId, got {other:?}"),
        }
    }

    #[test]
    fn test_in_memory_table_is_validated() {
        assert!(matches!(
            EmrTable::new(Vec::new()).unwrap_err(),
            DataError::EmptyTable
        ));
        assert!(matches!(
            EmrTable::new(vec![EyeRecord::new(" ", 10, 10)]).unwrap_err(),
            DataError::EmptyEyeId(1)
        ));
        assert!(matches!(
            EmrTable::new(vec![EyeRecord::new("a", 10, -1)]).unwrap_err(),
            DataError::InvalidVa { .. }
        ));
        let table = EmrTable::new(vec![EyeRecord::new("a", 0, 100)]).unwrap();
        assert!(!table.is_empty());
    }
}
