//! BTCUSD minute-bar recorder - Entry Point
//!
//! Streams Polygon crypto minute aggregates for BTCUSD into daily CSV
//! files under `data/`, reconnecting on failure until stopped with Ctrl-C.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// BTCUSD minute-bar streaming recorder
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via BARSTREAM_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    barstream_feed::init_crypto();

    let args = Args::parse();

    barstream_telemetry::init_logging()?;

    info!("Starting barstream v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > BARSTREAM_CONFIG env var > built-in defaults
    let config_path = args
        .config
        .or_else(|| std::env::var("BARSTREAM_CONFIG").ok());

    info!(config_path = ?config_path, "Loading configuration");
    let config = barstream_bot::AppConfig::load(config_path.as_deref())?;
    info!(ws_url = %config.ws_url, data_dir = %config.data_dir, "Configuration loaded");

    let app = barstream_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
