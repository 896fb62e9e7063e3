//! Request handler that answers `usage-v1` queries.
//!
//! One query is handled as:
//!
//! ```text
//! decode name ──▶ release lookup ──▶ build answer ──▶ record usage ──▶ respond
//!      │                │                  │               │
//!      └── malformed    └── not found /    └── bad tag     └── failure is
//!          (silent)         error (silent)     (silent)        logged only
//! ```
//!
//! Nothing is sent back when a query cannot be answered. Usage is only
//! recorded for projects that resolved, and always for the version that was
//! asked about rather than the latest one.

use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::Record;
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::codec::{decode_v1, ProjectVersion};
use crate::config::DnsConfig;
use crate::error::{LookupError, ResolveError, UsageError};
use crate::metrics::{self, QueryResult, Timer};
use crate::records::answer_records;
use crate::release::ReleaseLookup;
use crate::usage::{UsageRecorder, USAGE_CHANNEL};

/// Resolves `usage-v1` names to the latest release of their project.
#[derive(Clone)]
pub struct UsageResolver {
    releases: Arc<dyn ReleaseLookup>,
    usage: Arc<dyn UsageRecorder>,
    config: Arc<DnsConfig>,
}

impl UsageResolver {
    /// Create a resolver over the given backends.
    pub fn new(
        config: DnsConfig,
        releases: Arc<dyn ReleaseLookup>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        Self {
            releases,
            usage,
            config: Arc::new(config),
        }
    }

    /// Answer records for a query name.
    pub async fn resolve(&self, name: &str) -> Result<Vec<Record>, ResolveError> {
        let requested = decode_v1(name)?;
        trace!(project = %requested.project, version = %requested.version, "decoded query");

        let latest = self.lookup(&requested.project).await?;
        let answers = answer_records(&latest, self.config.ttl)?;

        self.track(&requested).await;

        Ok(answers)
    }

    async fn lookup(&self, project: &str) -> Result<ProjectVersion, ResolveError> {
        let timer = Timer::start();
        let result = tokio::time::timeout(
            self.config.lookup_timeout(),
            self.releases.latest(project),
        )
        .await
        .unwrap_or_else(|_| Err(LookupError::Timeout));

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(_) => "error",
        };
        metrics::record_lookup(outcome, timer.elapsed());

        match result? {
            Some(tag) => Ok(ProjectVersion::new(project, tag)),
            None => Err(ResolveError::NotFound {
                project: project.to_string(),
            }),
        }
    }

    async fn track(&self, requested: &ProjectVersion) {
        let result = tokio::time::timeout(
            self.config.track_timeout(),
            self.usage.record(USAGE_CHANNEL, requested),
        )
        .await
        .unwrap_or_else(|_| Err(UsageError::Timeout));

        metrics::record_usage_event(result.is_ok());
        if let Err(e) = result {
            warn!(
                project = %requested.project,
                version = %requested.version,
                error = %e,
                "failed to record usage"
            );
        }
    }

    async fn resolve_request(&self, request: &Request) -> Result<Vec<Record>, ResolveError> {
        let query = request.queries().first().ok_or(ResolveError::NoQuestion)?;
        // `name()` is lowercased by hickory; decode what the client sent.
        let name = query.original().name().to_string();
        self.resolve(&name).await
    }
}

/// Response info for a query that is dropped without an answer.
fn dropped(request: &Request) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}

#[async_trait]
impl RequestHandler for UsageResolver {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        let answers = match self.resolve_request(request).await {
            Ok(answers) => answers,
            Err(e) => {
                match &e {
                    ResolveError::Lookup(_) | ResolveError::Record(_) => {
                        warn!(src = %request.src(), error = %e, "release lookup failed")
                    }
                    _ => debug!(src = %request.src(), error = %e, "ignoring query"),
                }
                metrics::record_query(QueryResult::from(&e), timer.elapsed());
                return dropped(request);
            }
        };

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);
        let response = MessageResponseBuilder::from_message_request(request).build(
            header,
            answers.iter(),
            &[],
            &[],
            &[],
        );

        match response_handle.send_response(response).await {
            Ok(info) => {
                metrics::record_query(QueryResult::Answered, timer.elapsed());
                info
            }
            Err(e) => {
                warn!(src = %request.src(), error = %e, "failed to write response");
                metrics::record_query(QueryResult::WriteError, timer.elapsed());
                dropped(request)
            }
        }
    }
}
