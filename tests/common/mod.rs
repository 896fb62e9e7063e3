//! Shared test infrastructure for resolver integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use usage_dns::config::DnsConfig;
use usage_dns::{
    LookupError, ProjectVersion, ReleaseLookup, UsageError, UsageRecorder, UsageResolver,
};

// --- TestResponseHandler ---

/// Captures the serialized DNS response, if any, for inspection in tests.
///
/// The response is serialized via `MessageResponse::destructive_emit()` and
/// stored as raw wire-format bytes, which can then be parsed with
/// `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(None)),
        }
    }

    /// True if the handler was asked to send something.
    pub fn responded(&self) -> bool {
        self.buf.lock().unwrap().is_some()
    }

    /// Parse the captured wire bytes into a `Message`, `None` if nothing was sent.
    pub fn into_message(self) -> Option<Message> {
        let buf = self.buf.lock().unwrap();
        buf.as_ref()
            .map(|bytes| Message::from_vec(bytes).expect("failed to parse captured DNS response"))
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut bytes = Vec::with_capacity(512);
        let mut encoder = BinEncoder::new(&mut bytes);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        *self.buf.lock().unwrap() = Some(bytes);
        Ok(info)
    }
}

// --- Backend doubles ---

/// Release lookup with a fixed table; projects listed in `failing` error out.
#[derive(Default)]
pub struct StubReleases {
    tags: HashMap<String, String>,
    failing: Vec<String>,
    calls: AtomicUsize,
}

impl StubReleases {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_release(mut self, project: &str, tag: &str) -> Self {
        self.tags.insert(project.to_string(), tag.to_string());
        self
    }

    pub fn with_failure(mut self, project: &str) -> Self {
        self.failing.push(project.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReleaseLookup for StubReleases {
    async fn latest(&self, project: &str) -> Result<Option<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|p| p == project) {
            return Err(LookupError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(self.tags.get(project).cloned())
    }
}

/// Usage recorder that remembers every event; optionally fails each call.
#[derive(Default)]
pub struct StubUsage {
    fail: bool,
    events: Mutex<Vec<(String, ProjectVersion)>>,
}

impl StubUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<(String, ProjectVersion)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl UsageRecorder for StubUsage {
    async fn record(&self, channel: &str, event: &ProjectVersion) -> Result<(), UsageError> {
        self.events
            .lock()
            .unwrap()
            .push((channel.to_string(), event.clone()));
        if self.fail {
            return Err(UsageError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(())
    }
}

// --- Resolver construction ---

pub fn test_dns_config() -> DnsConfig {
    DnsConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        lookup_timeout_ms: 500,
        track_timeout_ms: 500,
        ..DnsConfig::default()
    }
}

pub fn build_resolver(releases: Arc<StubReleases>, usage: Arc<StubUsage>) -> UsageResolver {
    UsageResolver::new(test_dns_config(), releases, usage)
}

// --- Query/Request construction ---

pub fn test_src() -> SocketAddr {
    "10.0.0.1:12345".parse().unwrap()
}

/// Build a DNS query message.
pub fn build_query(name: &str, record_type: RecordType, id: u16) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` from an already constructed message.
pub fn request_from_message(msg: &Message) -> Request {
    let bytes = msg.to_vec().unwrap();
    Request::new(parse_message_request(&bytes), test_src(), Protocol::Udp)
}

/// Build a full `Request` for a single question.
pub fn build_request(name: &str, record_type: RecordType, id: u16) -> Request {
    request_from_message(&build_query(name, record_type, id))
}

// --- Response helpers ---

/// Run a query through the resolver and return the response, if one was sent.
pub async fn execute_query(
    resolver: &UsageResolver,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Option<Message> {
    let request = build_request(name, record_type, id);
    let handler = TestResponseHandler::new();
    resolver.handle_request(&request, handler.clone()).await;
    handler.into_message()
}

/// PTR targets in the answer section.
pub fn extract_ptr_targets(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::PTR(ptr) => Some(ptr.0.to_string()),
            _ => None,
        })
        .collect()
}

/// TXT strings of each TXT record in the answer section.
pub fn extract_txt(msg: &Message) -> Vec<Vec<String>> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::TXT(txt) => Some(
                txt.iter()
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect(),
            ),
            _ => None,
        })
        .collect()
}
