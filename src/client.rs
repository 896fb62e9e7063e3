//! Client side of the `usage-v1` protocol.
//!
//! Programs embed a [`UsageClient`] to report which version of a project is
//! running ([`UsageClient::send`]) or to ask which version is the latest
//! ([`UsageClient::request_latest`]).

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RData, RecordType};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::codec::{decode_v1, encode_v1, latest_alias, ProjectVersion};
use crate::error::ClientError;

/// Public usage server.
pub const DEFAULT_SERVER: &str = "usage.gliderlabs.com:53";

/// Bound on connecting, writing and (for lookups) reading.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

const MAX_RESPONSE_SIZE: usize = 4096;

/// Sends `usage-v1` queries to a usage server over UDP.
#[derive(Debug, Clone)]
pub struct UsageClient {
    server: String,
    timeout: Duration,
}

impl Default for UsageClient {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER)
    }
}

impl UsageClient {
    /// Client for `server` (`host:port`) with the default timeout.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the exchange timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the server for the latest release of `pv.project`.
    pub async fn request_latest(&self, pv: &ProjectVersion) -> Result<ProjectVersion, ClientError> {
        let deadline = Instant::now() + self.timeout;
        let name = latest_alias(&pv.project);
        let query = build_query(&name)?;

        let socket = self.connect(deadline).await?;
        with_deadline(deadline, socket.send(&query.to_vec()?)).await??;
        trace!(%name, "sent latest query");

        let response = with_deadline(deadline, read_response(&socket, query.id())).await??;
        latest_from_response(&response)
    }

    /// Report usage of `pv` without waiting for an answer.
    pub async fn send(&self, pv: &ProjectVersion) -> Result<(), ClientError> {
        let deadline = Instant::now() + self.timeout;
        let query = build_query(&encode_v1(pv))?;

        let socket = self.connect(deadline).await?;
        with_deadline(deadline, socket.send(&query.to_vec()?)).await??;
        debug!(project = %pv.project, version = %pv.version, "sent usage report");
        Ok(())
    }

    async fn connect(&self, deadline: Instant) -> Result<UdpSocket, ClientError> {
        with_deadline(deadline, async {
            let server = tokio::net::lookup_host(self.server.as_str())
                .await?
                .next()
                .ok_or_else(|| ClientError::Unresolvable(self.server.clone()))?;

            let local: SocketAddr = if server.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).await?;
            socket.connect(server).await?;
            Ok::<_, ClientError>(socket)
        })
        .await?
    }
}

async fn with_deadline<F: std::future::Future>(
    deadline: Instant,
    future: F,
) -> Result<F::Output, ClientError> {
    tokio::time::timeout_at(deadline, future)
        .await
        .map_err(|_| ClientError::Timeout)
}

/// PTR query for `name` with a random id.
fn build_query(name: &str) -> Result<Message, ClientError> {
    let mut msg = Message::new();
    msg.set_id(rand::random::<u16>());
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_ascii(name)?, RecordType::PTR));
    Ok(msg)
}

/// Read datagrams until one parses as a response to `id`.
async fn read_response(socket: &UdpSocket, id: u16) -> Result<Message, ClientError> {
    let mut buf = vec![0u8; MAX_RESPONSE_SIZE];
    loop {
        let len = socket.recv(&mut buf).await?;
        match Message::from_vec(&buf[..len]) {
            Ok(msg) if msg.id() == id && msg.message_type() == MessageType::Response => {
                return Ok(msg)
            }
            Ok(msg) => trace!(id = msg.id(), "ignoring unrelated response"),
            Err(e) => trace!(error = %e, "ignoring undecodable datagram"),
        }
    }
}

/// Decode the first PTR answer of a response.
fn latest_from_response(response: &Message) -> Result<ProjectVersion, ClientError> {
    let target = response
        .answers()
        .iter()
        .find_map(|record| match record.data() {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .ok_or(ClientError::NoAnswer)?;

    Ok(decode_v1(&target)?)
}
