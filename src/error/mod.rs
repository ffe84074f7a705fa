use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the pipeline stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not find a {field} column in {path:?}; columns found: {available:?}")]
    MissingColumn {
        field: &'static str,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("line {line}: unparseable date {value:?}")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: unmapped sentiment label {value:?}")]
    UnmappedSentiment { line: u64, value: String },

    #[error("provider returned no rows for {symbol} in [{start}, {end})")]
    NoData {
        symbol: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("not enough rows: {rows} available, need {needed}")]
    InsufficientData { rows: usize, needed: usize },

    #[error("model has not been fitted yet")]
    NotFitted,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
