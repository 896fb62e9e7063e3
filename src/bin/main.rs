//! usage-dns binary entry point.

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use usage_dns::{telemetry, Config, DnsServer};

/// DNS server that answers release lookups and records usage.
#[derive(Parser, Debug)]
#[command(name = "usage-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Optional; every setting can also
    /// come from `USAGE_DNS__<SECTION>__<KEY>` environment variables.
    #[arg(short, long, default_value = "usage-dns.toml")]
    config: PathBuf,

    /// Override the Keen flush interval in milliseconds (0 disables batching).
    #[arg(long)]
    flush_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config: Config = config::Config::builder()
        .add_source(config::File::from(args.config.clone()).required(false))
        .add_source(
            config::Environment::with_prefix("USAGE_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()?;

    if let Some(flush_ms) = args.flush_ms {
        config.keen.flush_interval_ms = flush_ms;
    }

    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        owner = %config.releases.owner,
        "Starting usage-dns"
    );

    // Build before installing the signal handler so bad config exits early.
    let server = DnsServer::new(config)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
        }
        signal_token.cancel();
    });

    if let Err(e) = server.run(shutdown).await {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }

    info!("usage-dns shutdown complete");
    Ok(())
}
