//! Calibration error types.

use thiserror::Error;

use crate::hub::FetchError;
use crate::tokenizer::TokenizerError;

/// Calibration dataset errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Unsupported calibration dataset '{0}' (use wikitext2, c4 or a path to a text file)")]
    UnsupportedDataset(String),

    #[error("Calibration text from {0} is empty")]
    EmptyText(String),

    #[error("Column '{column}' not found in {path} (found: {found:?})")]
    MissingColumn { path: String, column: String, found: Vec<String> },

    #[error("Failed to read parquet {path}: {message}")]
    Parquet { path: String, message: String },

    #[error("Line {line} of {path} is not a JSON document with a '{field}' string")]
    Document { path: String, line: usize, field: String },

    #[error("No document longer than {seqlen} tokens found in {draws} draws")]
    NoLongDocuments { seqlen: usize, draws: usize },

    #[error("Calibration sampling needs a positive {0}")]
    InvalidSampling(&'static str),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for calibration operations
pub type Result<T> = std::result::Result<T, CalibrationError>;
