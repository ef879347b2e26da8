//! Errors raised while loading static tables.

use ritlens_core::classifier::ThresholdError;
use thiserror::Error;

/// Errors that can occur when loading a norm or threshold table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid CSV or a row has the wrong shape.
    #[error("malformed table: {0}")]
    Csv(#[from] csv::Error),

    /// A row parsed but holds an unusable value.
    #[error("line {line}: {message}")]
    InvalidRow { line: u64, message: String },

    #[error("invalid benchmark threshold: {0}")]
    Threshold(#[from] ThresholdError),

    /// A grade key that is neither `K` nor a number.
    #[error("unknown grade key \"{0}\" (expected K or 0-12)")]
    GradeKey(String),
}
