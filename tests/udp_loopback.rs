//! Real UDP loopback tests: a `ServerFuture` on `127.0.0.1` serves the
//! resolver and `UsageClient` talks to it over the network stack.

mod common;

use std::sync::Arc;
use std::time::Duration;

use hickory_server::ServerFuture;
use tokio::net::UdpSocket;

use common::*;
use usage_dns::{ClientError, ProjectVersion, UsageClient, UsageResolver, USAGE_CHANNEL};

/// A test DNS server running on a random port.
struct TestServer {
    addr: String,
    _shutdown: tokio::sync::oneshot::Sender<()>,
}

impl TestServer {
    async fn start(resolver: UsageResolver) -> Self {
        let udp_socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("failed to bind UDP socket");
        let addr = udp_socket
            .local_addr()
            .expect("failed to get local addr")
            .to_string();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut server = ServerFuture::new(resolver);
            server.register_socket(udp_socket);

            tokio::select! {
                result = server.block_until_done() => {
                    if let Err(e) = result {
                        eprintln!("server error: {}", e);
                    }
                }
                _ = rx => {}
            }
        });

        // Give the server a moment to start accepting packets.
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            _shutdown: tx,
        }
    }

    fn client(&self) -> UsageClient {
        UsageClient::new(self.addr.clone()).with_timeout(Duration::from_millis(500))
    }
}

#[tokio::test]
async fn request_latest_over_udp() {
    let releases = Arc::new(StubReleases::new().with_release("widget", "3.1.4"));
    let usage = Arc::new(StubUsage::new());
    let server = TestServer::start(build_resolver(releases, usage.clone())).await;

    let latest = server
        .client()
        .request_latest(&ProjectVersion::new("widget", "2.0.0"))
        .await
        .unwrap();

    assert_eq!(latest, ProjectVersion::new("widget", "3.1.4"));
    // The lookup itself asks for the `latest` alias.
    assert_eq!(
        usage.events(),
        [(
            USAGE_CHANNEL.to_string(),
            ProjectVersion::new("widget", "latest")
        )]
    );
}

#[tokio::test]
async fn request_latest_for_unknown_project_times_out() {
    let releases = Arc::new(StubReleases::new());
    let usage = Arc::new(StubUsage::new());
    let server = TestServer::start(build_resolver(releases, usage.clone())).await;

    let result = server
        .client()
        .request_latest(&ProjectVersion::new("ghost", "1.0"))
        .await;

    assert!(matches!(result, Err(ClientError::Timeout)));
    assert!(usage.events().is_empty());
}

#[tokio::test]
async fn send_reports_usage() {
    let releases = Arc::new(StubReleases::new().with_release("widget", "3.1.4"));
    let usage = Arc::new(StubUsage::new());
    let server = TestServer::start(build_resolver(releases, usage.clone())).await;

    server
        .client()
        .send(&ProjectVersion::new("widget", "2.0.0"))
        .await
        .unwrap();

    // The server handles the report after the client has moved on.
    let mut events = Vec::new();
    for _ in 0..50 {
        events = usage.events();
        if !events.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(
        events,
        [(
            USAGE_CHANNEL.to_string(),
            ProjectVersion::new("widget", "2.0.0")
        )]
    );
}
