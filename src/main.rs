//! Range relay server.
//!
//! Serves hub-hosted dataset files under short logical paths, passing the
//! client's `Range` through so players can seek.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                  RANGE RELAY                   │
//!                        │                                                │
//!     GET /clip.mp4      │  ┌─────────┐    ┌──────────┐    ┌──────────┐  │      resolve/main/clip.mp4
//!     Range: bytes=0-99  │  │  http   │───▶│  relay   │───▶│ resolver │──┼────▶ (302 → 302 → CDN URL)
//!     ───────────────────┼─▶│ server  │    │ service  │    └──────────┘  │
//!                        │  └─────────┘    │          │    ┌──────────┐  │
//!     206 + body stream  │       ▲         │          │───▶│  ranged  │──┼────▶ CDN, same Range
//!     ◀──────────────────┼───────┴─────────│          │◀───│  fetch   │◀─┼───── 206 + body
//!                        │                 └──────────┘    └──────────┘  │
//!                        │                                                │
//!                        │   config · observability · lifecycle           │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use range_relay::config::RelayConfig;
use range_relay::http::HttpServer;
use range_relay::lifecycle::{trigger_on_signal, Shutdown};
use range_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "range-relay")]
#[command(about = "Range-aware redirect relay for hub datasets", long_about = None)]
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

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        namespace = %config.upstream.namespace,
        revision = %config.upstream.revision,
        follow_redirects = config.upstream.follow_redirects,
        "range-relay starting"
    );

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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    trigger_on_signal(&shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
