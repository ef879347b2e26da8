//! In-memory record source for tests and embedding.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use ritlens_core::error::SourceError;
use ritlens_core::model::JoinedRecord;
use ritlens_core::traits::{RecordBatch, RecordQuery, RecordSource};

/// A record source backed by a `Vec`, with call counting, optional latency
/// and failure injection.
pub struct InMemorySource {
    records: Vec<JoinedRecord>,
    /// Delay applied before every fetch.
    latency: Option<Duration>,
    /// When set, every fetch fails with `SourceError::Unavailable`.
    failure: Mutex<Option<String>>,
    /// Number of fetches made.
    call_count: AtomicU32,
    /// Last query received.
    last_query: Mutex<Option<RecordQuery>>,
}

impl InMemorySource {
    pub fn new(records: Vec<JoinedRecord>) -> Self {
        Self {
            records,
            latency: None,
            failure: Mutex::new(None),
            call_count: AtomicU32::new(0),
            last_query: Mutex::new(None),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent fetch fail with `message`.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    pub fn recover(&self) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = None;
        }
    }

    /// Get the number of fetches made against this source.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last query made against this source.
    pub fn last_query(&self) -> Option<RecordQuery> {
        self.last_query.lock().ok().and_then(|q| q.clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordSource for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn fetch_records(&self, query: &RecordQuery) -> Result<RecordBatch, SourceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(query.clone());
        }

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self.failure.lock().ok().and_then(|f| f.clone());
        if let Some(message) = failure {
            return Err(SourceError::Unavailable(message));
        }

        Ok(query.apply(&self.records))
    }
}
