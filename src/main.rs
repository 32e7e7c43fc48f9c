use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use logrelay::config;
use logrelay::gateway::{bounded, Gateway, SshGateway, Target};
use logrelay::{server, Relay};
use simple_logger::SimpleLogger;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialise logging")?;

    info!("Starting logrelay");

    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;
    info!("Configuration loaded successfully");

    let target = Target::parse(&cli.destination, config.port)?;
    let identity = config
        .identity
        .clone()
        .context("No private key configured")?;
    let gateway = Arc::new(SshGateway::new(target, identity));

    // Fail fast if the device is unreachable or rejects the key
    info!("Probing {}", gateway.target());
    let conn = bounded(
        "connect",
        config.deadlines().connect,
        &CancellationToken::new(),
        gateway.dial(),
    )
    .await
    .context("Failed to dial remote device")?;
    conn.close().await.context("Failed to close probe connection")?;

    let relay = Arc::new(Relay::from_config(gateway, &config));
    server::serve(relay, &config.public_dir, config.listen).await
}
