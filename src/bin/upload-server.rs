//! Upload API server.
//!
//! Accepts multipart uploads, stages them on disk and commits them to the
//! dataset the relay serves from.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use range_relay::config::RelayConfig;
use range_relay::lifecycle::{trigger_on_signal, Shutdown};
use range_relay::observability::{logging, metrics};
use range_relay::upload::UploadServer;

#[derive(Parser)]
#[command(name = "upload-server")]
#[command(about = "Upload API for the relay's dataset", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref())?;
    logging::init(&config.observability);

    if config.upload.token.is_none() {
        tracing::warn!("HUGGINGFACE_TOKEN is not set; hub calls will be anonymous");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.upload.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for uploads");

    let shutdown = Shutdown::new();
    trigger_on_signal(&shutdown);

    let server = UploadServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
