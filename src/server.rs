//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::error::DnsError;
use crate::release::{GithubReleases, ReleaseLookup};
use crate::resolver::UsageResolver;
use crate::usage::{BatchRecorder, KeenClient, UsageRecorder};

/// DNS server answering `usage-v1` queries.
pub struct DnsServer {
    config: Config,
    resolver: UsageResolver,
    batch: Option<BatchRecorder>,
}

impl DnsServer {
    /// Build the backends and resolver for the given configuration.
    pub fn new(config: Config) -> Result<Self, DnsError> {
        config.validate()?;

        let releases: Arc<dyn ReleaseLookup> = Arc::new(GithubReleases::new(&config.releases)?);
        let keen = KeenClient::new(&config.keen)?;

        let batch = config
            .keen
            .flush_interval()
            .map(|_| BatchRecorder::new(keen.clone()));
        let usage: Arc<dyn UsageRecorder> = match &batch {
            Some(batch) => Arc::new(batch.clone()),
            None => Arc::new(keen),
        };

        let resolver = UsageResolver::new(config.dns.clone(), releases, usage);
        Ok(Self::with_resolver(config, resolver, batch))
    }

    /// Assemble a server around an existing resolver.
    pub fn with_resolver(
        config: Config,
        resolver: UsageResolver,
        batch: Option<BatchRecorder>,
    ) -> Self {
        Self {
            config,
            resolver,
            batch,
        }
    }

    /// Run the DNS server until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), DnsError> {
        let dns = &self.config.dns;
        info!(
            listen_addr = %dns.listen_addr,
            owner = %self.config.releases.owner,
            batching = self.batch.is_some(),
            "Starting usage-dns server"
        );

        let flusher_shutdown = shutdown.child_token();
        let interval = self.config.keen.flush_interval();
        let flusher: Option<JoinHandle<()>> = match (&self.batch, interval) {
            (Some(batch), Some(interval)) => {
                Some(batch.spawn_flusher(interval, flusher_shutdown.clone()))
            }
            _ => None,
        };

        let mut server = ServerFuture::new(self.resolver.clone());

        let udp_socket = UdpSocket::bind(dns.listen_addr).await?;
        info!(addr = %dns.listen_addr, "DNS UDP listening");
        server.register_socket(udp_socket);

        let tcp_listener = TcpListener::bind(dns.listen_addr).await?;
        info!(addr = %dns.listen_addr, "DNS TCP listening");
        server.register_listener(tcp_listener, dns.tcp_timeout());

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("DNS server shutdown requested");
            }
            result = server.block_until_done() => {
                if let Err(e) = result {
                    error!("DNS server error: {}", e);
                }
            }
        }

        // Flush whatever usage is still buffered.
        flusher_shutdown.cancel();
        if let Some(handle) = flusher {
            let _ = handle.await;
        }

        info!("DNS server stopped");
        Ok(())
    }
}
