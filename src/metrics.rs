//! Metrics instrumentation for usage-dns.
//!
//! All metrics are prefixed with `usage_dns.`

use metrics::{counter, histogram};
use std::time::Instant;

use crate::error::ResolveError;

/// Record a handled DNS query.
pub fn record_query(result: QueryResult, duration: std::time::Duration) {
    counter!("usage_dns.query.count", "result" => result.as_str()).increment(1);
    histogram!("usage_dns.query.duration.seconds", "result" => result.as_str())
        .record(duration.as_secs_f64());
}

/// Outcome of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Answer records were written.
    Answered,
    /// Name was missing or not a `usage-v1` name.
    Malformed,
    /// Project unknown or without releases.
    NotFound,
    /// Upstream lookup failed or its tag was unusable.
    UpstreamError,
    /// Answer was built but could not be written.
    WriteError,
}

impl QueryResult {
    fn as_str(self) -> &'static str {
        match self {
            QueryResult::Answered => "answered",
            QueryResult::Malformed => "malformed",
            QueryResult::NotFound => "not_found",
            QueryResult::UpstreamError => "upstream_error",
            QueryResult::WriteError => "write_error",
        }
    }
}

impl From<&ResolveError> for QueryResult {
    fn from(err: &ResolveError) -> Self {
        match err {
            ResolveError::NoQuestion | ResolveError::Malformed(_) => QueryResult::Malformed,
            ResolveError::NotFound { .. } => QueryResult::NotFound,
            ResolveError::Lookup(_) | ResolveError::Record(_) => QueryResult::UpstreamError,
        }
    }
}

/// Record one release lookup.
pub fn record_lookup(outcome: &'static str, duration: std::time::Duration) {
    counter!("usage_dns.lookup.count", "outcome" => outcome).increment(1);
    histogram!("usage_dns.lookup.duration.seconds").record(duration.as_secs_f64());
}

/// Record the outcome of handing one usage event to the recorder.
pub fn record_usage_event(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("usage_dns.usage.event.count", "outcome" => outcome).increment(1);
}

/// Record one batch flush to the usage backend.
pub fn record_batch_flush(events: usize, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("usage_dns.usage.flush.count", "outcome" => outcome).increment(1);
    histogram!("usage_dns.usage.flush.events").record(events as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
