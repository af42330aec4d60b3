use crate::family::Family;
use chrono::NaiveDate;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("filename '{filename}' does not match any {family} trace naming pattern")]
    MalformedFilename { filename: String, family: Family },

    #[error("filename '{filename}' has an unrecognised {kind} code '{token}'")]
    UnknownResourceSubtype {
        filename: String,
        kind: &'static str,
        token: String,
    },

    #[error("trace rows are not in ascending date order: row {row} ({found}) follows {previous}")]
    UnsortedInput {
        row: usize,
        previous: NaiveDate,
        found: NaiveDate,
    },

    #[error("{count} interval columns do not map onto a supported trace resolution (24, 48, 96 or 288)")]
    UnsupportedIntervalCount { count: usize },

    #[error("row {row} has {found} interval values, expected {expected}")]
    IntervalCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("trace table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: '{year}-{month}-{day}' is not a valid calendar date")]
    InvalidDate {
        row: usize,
        year: String,
        month: String,
        day: String,
    },

    #[error("a {found} filter cannot be applied to {expected} traces")]
    FilterFamilyMismatch { expected: Family, found: Family },

    #[error("input directory {0} does not exist")]
    InvalidInputDirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, TraceError>;
