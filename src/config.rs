//! Configuration types for usage-dns.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::DnsError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Release lookup backend.
    pub releases: ReleaseConfig,

    /// Usage event backend.
    pub keen: KeenConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<(), DnsError> {
        if self.keen.project_id.trim().is_empty() || self.keen.write_key.trim().is_empty() {
            return Err(DnsError::Config(
                "keen.project_id and keen.write_key must both be set".to_string(),
            ));
        }
        if self.releases.owner.trim().is_empty() {
            return Err(DnsError::Config("releases.owner must be set".to_string()));
        }
        Ok(())
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for DNS server to listen on (UDP and TCP).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// TTL for answer records in seconds.
    #[serde(default)]
    pub ttl: u32,

    /// Upper bound on one release lookup, in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Upper bound on submitting one usage event, in milliseconds.
    #[serde(default = "default_track_timeout_ms")]
    pub track_timeout_ms: u64,

    /// Idle timeout for TCP connections in seconds.
    #[serde(default = "default_tcp_timeout_secs")]
    pub tcp_timeout_secs: u64,
}

impl DnsConfig {
    /// Release lookup timeout.
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Usage submission timeout.
    pub fn track_timeout(&self) -> Duration {
        Duration::from_millis(self.track_timeout_ms)
    }

    /// TCP idle timeout.
    pub fn tcp_timeout(&self) -> Duration {
        Duration::from_secs(self.tcp_timeout_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            ttl: 0,
            lookup_timeout_ms: default_lookup_timeout_ms(),
            track_timeout_ms: default_track_timeout_ms(),
            tcp_timeout_secs: default_tcp_timeout_secs(),
        }
    }
}

/// GitHub release lookup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Account or organization owning the tracked projects.
    pub owner: String,

    /// GitHub API base URL.
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Optional API token, sent as a bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// User-Agent header (GitHub rejects requests without one).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Keen event ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeenConfig {
    /// Keen project id.
    pub project_id: String,

    /// Keen write key.
    pub write_key: String,

    /// Keen API base URL.
    #[serde(default = "default_keen_api_url")]
    pub api_url: String,

    /// Batch flush interval in milliseconds. Zero posts every event directly.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Upper bound on one Keen request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl KeenConfig {
    /// Batch flush interval, `None` when batching is disabled.
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_ms > 0).then(|| Duration::from_millis(self.flush_interval_ms))
    }

    /// Keen request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "usage_dns=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log line format.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            prometheus_addr: None,
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 53))
}

fn default_lookup_timeout_ms() -> u64 {
    5000
}

fn default_track_timeout_ms() -> u64 {
    2000
}

fn default_tcp_timeout_secs() -> u64 {
    30
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    concat!("usage-dns/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_keen_api_url() -> String {
    "https://api.keen.io".to_string()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}
