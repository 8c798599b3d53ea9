//! # Matrix File Loading
//!
//! Reads the plain-text numeric matrices that upstream samplers and feature
//! extractors write (`savetxt`-style): one row per line, fields separated by
//! tabs, commas or runs of spaces, no header, `#` comment lines ignored.
//!
//! - Strict shape: every row must have the same number of fields.
//! - Strict values: every field must parse as a finite `f64`.
//! - User-centric errors: failures carry the file path and the 1-based row and
//!   column so the offending entry can be located.

use csv::{ReaderBuilder, Trim};
use log::debug;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// A comprehensive error type for matrix and name file loading.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error from the CSV reader: {0}")]
    CsvError(#[from] csv::Error),
    #[error("The file '{0}' contains no data rows.")]
    EmptyFile(String),
    #[error("Row {row} of '{path}' has {found} fields, but the first row has {expected}.")]
    RaggedRow {
        path: String,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Row {row}, column {column} of '{path}' is not a number: '{token}'.")]
    NotNumeric {
        path: String,
        row: usize,
        column: usize,
        token: String,
    },
    #[error("Row {row}, column {column} of '{path}' is not finite (NaN or Infinity).")]
    NonFinite {
        path: String,
        row: usize,
        column: usize,
    },
    #[error("Parsed values do not form a rectangular matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Loads a numeric matrix, one row per non-comment line.
pub fn load_matrix(path: &Path) -> Result<Array2<f64>, DataError> {
    let display = path.display().to_string();
    let delimiter = detect_delimiter(path)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(Trim::All)
        .from_reader(File::open(path)?);

    let mut values = Vec::new();
    let mut ncols: Option<usize> = None;
    let mut nrows = 0;

    for record in reader.records() {
        let record = record?;
        // Repeated spaces produce empty fields; they carry no value.
        let fields: Vec<&str> = record.iter().filter(|field| !field.is_empty()).collect();
        if fields.is_empty() {
            continue;
        }
        let row = nrows + 1;
        let expected = *ncols.get_or_insert(fields.len());
        if fields.len() != expected {
            return Err(DataError::RaggedRow {
                path: display,
                row,
                expected,
                found: fields.len(),
            });
        }
        for (idx, token) in fields.iter().enumerate() {
            let value: f64 = token.parse().map_err(|_| DataError::NotNumeric {
                path: display.clone(),
                row,
                column: idx + 1,
                token: token.to_string(),
            })?;
            if !value.is_finite() {
                return Err(DataError::NonFinite {
                    path: display,
                    row,
                    column: idx + 1,
                });
            }
            values.push(value);
        }
        nrows += 1;
    }

    let Some(ncols) = ncols else {
        return Err(DataError::EmptyFile(display));
    };
    debug!("Loaded {nrows} x {ncols} matrix from '{display}'");
    Ok(Array2::from_shape_vec((nrows, ncols), values)?)
}

/// Loads predictor names, one per non-empty line.
pub fn load_names(path: &Path) -> Result<Vec<String>, DataError> {
    let names: Vec<String> = fs::read_to_string(path)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(DataError::EmptyFile(path.display().to_string()));
    }
    Ok(names)
}

/// Chooses tab, comma or space from the first data line.
fn detect_delimiter(path: &Path) -> Result<u8, DataError> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        return Ok(if trimmed.contains('\t') {
            b'\t'
        } else if trimmed.contains(',') {
            b','
        } else {
            b' '
        });
    }
    Ok(b' ')
}
