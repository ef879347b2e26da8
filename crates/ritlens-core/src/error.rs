//! Error types for the aggregation layer.
//!
//! Data-access failures are their own variant so callers can tell a computed
//! zero apart from a computation that never ran.

use thiserror::Error;

/// Errors raised by a [`RecordSource`](crate::traits::RecordSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("record source unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the query.
    #[error("query failed: {0}")]
    Query(String),

    /// Stored data could not be decoded into records.
    #[error("failed to decode stored records: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by analytics queries.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Reading records failed.
    #[error("data access failed: {0}")]
    Source(#[from] SourceError),

    /// The caller cancelled the query before it completed.
    #[error("query cancelled")]
    Cancelled,

    /// The request itself is unusable (e.g. an empty cohort prefix).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AnalyticsError {
    /// Returns `true` if the failure came from the underlying data store.
    pub fn is_data_access(&self) -> bool {
        matches!(self, AnalyticsError::Source(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AnalyticsError::Cancelled)
    }
}
