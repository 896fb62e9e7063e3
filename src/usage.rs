//! Usage event recording backed by the Keen event API.
//!
//! [`KeenClient`] posts each event as it is recorded. [`BatchRecorder`]
//! buffers events in memory and a background task posts them in one request
//! per flush interval.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::codec::ProjectVersion;
use crate::config::KeenConfig;
use crate::error::{DnsError, UsageError};
use crate::metrics;

/// Collection that usage events are written to.
pub const USAGE_CHANNEL: &str = "usage";

/// Sink for usage events.
///
/// Implementations may deliver asynchronously; an `Ok` only means the event
/// was accepted.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Submit one event to `channel`.
    async fn record(&self, channel: &str, event: &ProjectVersion) -> Result<(), UsageError>;
}

/// Keen API client scoped to one project.
#[derive(Debug, Clone)]
pub struct KeenClient {
    http: reqwest::Client,
    api_url: Url,
    project_id: String,
    write_key: String,
}

impl KeenClient {
    /// Build a client from configuration.
    pub fn new(config: &KeenConfig) -> Result<Self, DnsError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| DnsError::Config(format!("invalid keen.api_url: {e}")))?;

        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()?,
            api_url,
            project_id: config.project_id.clone(),
            write_key: config.write_key.clone(),
        })
    }

    fn events_url(&self, collection: Option<&str>) -> Result<Url, UsageError> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| UsageError::Url(self.api_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["3.0", "projects", self.project_id.as_str(), "events"]);
            if let Some(collection) = collection {
                segments.push(collection);
            }
        }
        Ok(url)
    }

    /// Post a single event to `collection`.
    pub async fn add_event<T>(&self, collection: &str, event: &T) -> Result<(), UsageError>
    where
        T: Serialize + ?Sized,
    {
        let url = self.events_url(Some(collection))?;
        self.post(url, event).await
    }

    /// Post several collections of events in one request.
    pub async fn add_events(
        &self,
        events: &HashMap<String, Vec<serde_json::Value>>,
    ) -> Result<(), UsageError> {
        let url = self.events_url(None)?;
        self.post(url, events).await
    }

    async fn post<T>(&self, url: Url, body: &T) -> Result<(), UsageError>
    where
        T: Serialize + ?Sized,
    {
        let response = self
            .http
            .post(url)
            .header(reqwest::header::AUTHORIZATION, self.write_key.as_str())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UsageError::Timeout
                } else {
                    UsageError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UsageError::Status(status));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageRecorder for KeenClient {
    async fn record(&self, channel: &str, event: &ProjectVersion) -> Result<(), UsageError> {
        self.add_event(channel, event).await
    }
}

/// Buffers events and posts them to Keen in batches.
#[derive(Debug, Clone)]
pub struct BatchRecorder {
    client: KeenClient,
    pending: Arc<Mutex<HashMap<String, Vec<serde_json::Value>>>>,
}

impl BatchRecorder {
    /// Create an empty batch recorder.
    pub fn new(client: KeenClient) -> Self {
        Self {
            client,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of buffered events.
    pub fn pending(&self) -> usize {
        self.pending.lock().values().map(Vec::len).sum()
    }

    /// Post all buffered events. Returns how many were sent.
    ///
    /// A failed batch is dropped, not re-queued.
    pub async fn flush(&self) -> Result<usize, UsageError> {
        let batch = std::mem::take(&mut *self.pending.lock());
        let count: usize = batch.values().map(Vec::len).sum();
        if count == 0 {
            return Ok(0);
        }

        let result = self.client.add_events(&batch).await;
        metrics::record_batch_flush(count, result.is_ok());
        result.map(|()| count)
    }

    /// Flush every `interval` until `shutdown` is cancelled, then flush once
    /// more.
    pub fn spawn_flusher(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let recorder = self.clone();
        tokio::spawn(async move { recorder.flush_loop(interval, shutdown).await })
    }

    async fn flush_loop(self, interval: Duration, shutdown: CancellationToken) {
        // First tick one interval out; shutdown handles anything left over.
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.flush().await {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "flushed usage events"),
                        Err(e) => warn!(error = %e, "failed to flush usage events"),
                    }
                }
                _ = shutdown.cancelled() => {
                    if let Err(e) = self.flush().await {
                        warn!(error = %e, "failed final flush of usage events");
                    }
                    debug!("usage flusher shutting down");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl UsageRecorder for BatchRecorder {
    async fn record(&self, channel: &str, event: &ProjectVersion) -> Result<(), UsageError> {
        let value = serde_json::to_value(event)?;
        self.pending
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(value);
        Ok(())
    }
}
