//! `gantry-mcp-bridge` entry point.

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use gantry_mcp_bridge::config::BridgeConfig;
use gantry_mcp_bridge::events::TracingEvents;
use gantry_mcp_bridge::service::BridgeService;
use gantry_mcp_bridge::{sse, stdio};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportKind {
    /// Event-stream binding: long-lived SSE stream plus a command endpoint.
    Sse,
    /// Standard-stream binding: line-delimited frames on stdin/stdout.
    Stdio,
}

#[derive(Debug, Parser)]
#[command(
    name = "gantry-mcp-bridge",
    version,
    about = "Expose an OpenAPI-described HTTP API as MCP tools"
)]
struct Cli {
    /// Path to the bridge configuration file (YAML).
    #[arg(long, env = "GANTRY_CONFIG")]
    config: PathBuf,

    /// Wire binding to serve.
    #[arg(long, value_enum, default_value = "sse")]
    transport: TransportKind,

    /// Listen address for the event-stream binding.
    #[arg(long, default_value = "127.0.0.1:8970")]
    bind: SocketAddr,

    /// Log level filter (RUST_LOG overrides).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.transport);

    let config = BridgeConfig::from_file(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;

    let service = BridgeService::new(config, Arc::new(TracingEvents));

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    match cli.transport {
        TransportKind::Sse => sse::serve(service, cli.bind, shutdown).await?,
        TransportKind::Stdio => stdio::serve(service, shutdown).await?,
    }

    Ok(())
}

fn init_tracing(level: &str, transport: TransportKind) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if transport == TransportKind::Stdio {
        // stdout carries protocol frames on the stdio binding.
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
}
