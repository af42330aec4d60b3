use isp_trace_parser::TraceError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("end year {end_year} is before start year {start_year}")]
    InvalidRange { start_year: i32, end_year: i32 },

    #[error("at least one reference year is required")]
    EmptyReferenceYears,

    #[error("reference year mapping is empty")]
    EmptyMapping,

    #[error("no traces stored for {entity}")]
    UnknownEntity { entity: String },

    #[error("no partition {partition} holding {entity} for reference year {reference_year}")]
    PartitionNotFound {
        entity: String,
        reference_year: i32,
        partition: String,
    },

    #[error("reference year {reference_year} of {entity} holds no records for year {year}")]
    YearNotCovered {
        entity: String,
        year: i32,
        reference_year: i32,
    },

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid store glob pattern: {0}")]
    Glob(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
