//! Error types for usage-dns.

use thiserror::Error;

/// Errors produced when decoding a `usage-v1` query name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Name does not end in `.usage-v1.`.
    #[error("should end in '.usage-v1.'")]
    BadSuffix,

    /// No `.` between version and project.
    #[error("missing '.' separator")]
    MissingSeparator,

    /// Version label is empty.
    #[error("version should not be empty")]
    EmptyVersion,

    /// Project label is empty.
    #[error("project should not be empty")]
    EmptyProject,
}

/// Errors from the release lookup backend.
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP transport or body decoding failure.
    #[error("release request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a status other than success or not-found.
    #[error("release backend returned status {0}")]
    Status(reqwest::StatusCode),

    /// Latest release carries no tag name.
    #[error("latest release for {project} has no tag name")]
    MissingTag {
        /// Project that was looked up.
        project: String,
    },

    /// Lookup did not complete within the configured timeout.
    #[error("release lookup timed out")]
    Timeout,

    /// Request URL could not be built.
    #[error("invalid release URL: {0}")]
    Url(String),
}

/// Errors from the usage event backend.
#[derive(Debug, Error)]
pub enum UsageError {
    /// HTTP transport failure.
    #[error("usage request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("usage backend returned status {0}")]
    Status(reqwest::StatusCode),

    /// Event could not be serialized.
    #[error("failed to encode usage event: {0}")]
    Encode(#[from] serde_json::Error),

    /// Submission did not complete within the configured timeout.
    #[error("usage submission timed out")]
    Timeout,

    /// Request URL could not be built.
    #[error("invalid usage URL: {0}")]
    Url(String),
}

/// Why a query was not answered.
///
/// Every variant currently results in no response being sent. `NotFound` is
/// kept apart from upstream failures so a negative answer can be returned for
/// it later.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Message carried no question.
    #[error("query has no question")]
    NoQuestion,

    /// Question name is not a valid `usage-v1` name.
    #[error("malformed query name: {0}")]
    Malformed(#[from] DecodeError),

    /// Project does not exist or has no releases.
    #[error("no release found for project {project}")]
    NotFound {
        /// Project that was looked up.
        project: String,
    },

    /// Release lookup failed.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Answer records could not be built from the release tag.
    #[error("failed to build answer records: {0}")]
    Record(#[from] hickory_proto::ProtoError),
}

/// Errors returned by [`UsageClient`](crate::client::UsageClient).
#[derive(Debug, Error)]
pub enum ClientError {
    /// Response contained no PTR answer.
    #[error("no answer found")]
    NoAnswer,

    /// Exchange did not complete within the timeout.
    #[error("DNS exchange timed out")]
    Timeout,

    /// Server address could not be resolved.
    #[error("could not resolve server address {0}")]
    Unresolvable(String),

    /// Socket error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DNS message encoding or decoding failed.
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// PTR target is not a valid `usage-v1` name.
    #[error("malformed answer: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors that can occur while starting or running the DNS server.
#[derive(Debug, Error)]
pub enum DnsError {
    /// IO error (network, file, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),
}
