//! tabcast Server
//!
//! Browser automation relay: an HTTP API bridged to a browser extension
//! over a single WebSocket connection.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use tabcast_core::init_tracing;
use tabcast_server::relay::ExtensionRelay;
use tabcast_server::server::{AppState, build_router};

#[derive(Parser, Debug)]
#[command(name = "tabcast-server")]
#[command(version, about = "tabcast relay server - HTTP API bridged to a browser extension")]
struct Args {
    /// Address to listen on (overrides host/port from the settings file).
    #[arg(long, env = "TABCAST_ADDR")]
    addr: Option<SocketAddr>,

    /// Path to a settings file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default extension response timeout in seconds.
    #[arg(long)]
    response_timeout: Option<u64>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing("tabcast_server=info", args.log_json);

    let mut config = tabcast_core::config::load_config(args.config.as_deref())?;
    if let Some(timeout) = args.response_timeout {
        config.agent.response_timeout_secs = timeout;
    }

    let addr = match args.addr {
        Some(addr) => addr,
        None => format!("{}:{}", config.server.host, config.server.port).parse()?,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        %addr,
        response_timeout_secs = config.agent.response_timeout_secs,
        "Starting tabcast-server"
    );

    let relay = Arc::new(ExtensionRelay::new(Duration::from_secs(
        config.agent.response_timeout_secs,
    )));
    let app = build_router(AppState {
        relay,
        channel_capacity: config.agent.channel_capacity,
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening; waiting for the extension to connect on /ws");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Server stopped");
    Ok(())
}
