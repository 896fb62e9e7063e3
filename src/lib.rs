//! Usage DNS - release lookup and usage tracking over DNS.
//!
//! Clients encode a project and the version they run as a query name. The
//! server answers with the project's latest release and records the query as
//! a usage event.
//!
//! ## Name format
//!
//! ```text
//! <version>.<project>.usage-v1.
//!
//! 2.0.0.widget.usage-v1.
//!   → GitHub: latest release of <owner>/widget = 3.1.4
//!   → Keen:   usage event {Project: widget, Version: 2.0.0}
//!   → PTR latest.widget.usage-v1. → 3.1.4.widget.usage-v1.
//!     TXT latest.widget.usage-v1. "project=widget" "version=3.1.4"
//! ```
//!
//! Queries that cannot be answered (malformed names, unknown projects,
//! upstream failures) get no response at all.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          usage-dns                           │
//! │                                                              │
//! │  UDP/TCP ──▶ ┌───────────────┐ ──▶ ReleaseLookup (GitHub)    │
//! │     :53      │ UsageResolver │                               │
//! │  ◀────────── └───────────────┘ ──▶ UsageRecorder (Keen,      │
//! │                                    batched on a timer)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use usage_dns::{ProjectVersion, UsageClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = UsageClient::default();
//!     let running = ProjectVersion::new("logspout", "v3.2.0");
//!
//!     client.send(&running).await.ok();
//!     let latest = client.request_latest(&running).await.unwrap();
//!     println!("latest logspout is {}", latest.version);
//! }
//! ```

#![warn(missing_docs)]

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod records;
pub mod release;
pub mod resolver;
pub mod server;
pub mod telemetry;
pub mod usage;

// Re-export main types
pub use client::UsageClient;
pub use codec::{decode_v1, encode_v1, latest_alias, ProjectVersion};
pub use config::{Config, DnsConfig, KeenConfig, ReleaseConfig, TelemetryConfig};
pub use error::{ClientError, DecodeError, DnsError, LookupError, ResolveError, UsageError};
pub use release::{GithubReleases, ReleaseLookup};
pub use resolver::UsageResolver;
pub use server::DnsServer;
pub use usage::{BatchRecorder, KeenClient, UsageRecorder, USAGE_CHANNEL};
