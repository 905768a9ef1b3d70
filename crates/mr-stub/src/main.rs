//! mr-stub: message-router simulator binary.

use anyhow::{Context, Result};
use clap::Parser;
use mr_stub::{StubConfig, StubService};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Message-router simulator for integration tests
#[derive(Parser, Debug)]
#[command(name = "mr-stub")]
#[command(about = "In-memory message-router stub with long-poll topics and an optional bridge")]
#[command(version)]
struct Args {
    /// Listen address (overrides MR_STUB_HOST)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Listen port (overrides MR_STUB_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// HTTPS port (overrides MR_STUB_TLS_PORT)
    #[arg(long)]
    tls_port: Option<u16>,

    /// PEM certificate chain for HTTPS (overrides MR_STUB_TLS_CERT)
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    /// Unencrypted PEM private key for HTTPS (overrides MR_STUB_TLS_KEY)
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let mut config = StubConfig::from_env();
    if let Some(host) = args.host {
        config.http.host = host;
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(port) = args.tls_port {
        config.tls.port = port;
    }
    if let (Some(cert), Some(key)) = (args.tls_cert, args.tls_key) {
        config.tls.cert_path = Some(cert);
        config.tls.key_path = Some(key);
    }

    let service = StubService::new(config).context("failed to configure mr-stub")?;
    let shutdown = service.shutdown_handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
        }
        shutdown.trigger();
    });

    info!(version = mr_stub::VERSION, "Starting mr-stub. Press Ctrl+C to stop.");
    service.run().await.context("mr-stub server failed")?;

    Ok(())
}
