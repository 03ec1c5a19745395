// ABOUTME: CLI entry point for the magic-gateway server binary
// ABOUTME: Snapshots configuration, builds shared state, and starts the axum HTTP server
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2026 dravr.ai

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use magic_gateway::types::GatewayError;
use magic_gateway::{GatewayConfig, SecretStore};

use magic_gateway_server::router;
use magic_gateway_server::state::ServerState;

/// magic-gateway-server: stateless-JWT API gateway for AI-provider backends
#[derive(Parser)]
#[command(name = "magic-gateway-server", version, about)]
struct Cli {
    /// HTTP listen port (overrides `MAGIC_GATEWAY_PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// HTTP listen host (overrides `MAGIC_GATEWAY_HOST`)
    #[arg(long)]
    host: Option<String>,

    /// Verbose request and response logging
    #[arg(long)]
    debug: bool,

    /// Upstream timeout in seconds (overrides `MAGIC_GATEWAY_UPSTREAM_TIMEOUT_SECS`)
    #[arg(long)]
    upstream_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Snapshot before logging starts so .env can carry RUST_LOG and the debug flag
    let store = SecretStore::from_env()?;
    let mut config = GatewayConfig::from_store(&store)?;
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(host) = cli.host {
        config = config.with_host(host);
    }
    if cli.debug {
        config = config.with_debug(true);
    }
    if let Some(secs) = cli.upstream_timeout_secs {
        config = config.with_upstream_timeout(Duration::from_secs(secs));
    }

    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    if store.is_empty() {
        tracing::warn!("No backend configuration loaded, proxied requests will find no route");
    }
    let entries = store.len();

    let addr = config.listen_addr();
    let debug_mode = config.debug;
    let upstream_timeout = config.upstream_timeout;
    let state = Arc::new(ServerState::new(store, config)?);
    let key_id = state.authority().key_id().to_owned();
    let app = router::build(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(
        address = %addr,
        key_id = %key_id,
        entries,
        debug = debug_mode,
        upstream_timeout_secs = upstream_timeout.as_secs(),
        "Starting magic-gateway server"
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| GatewayError::internal(format!("Server error: {e}")))?;

    Ok(())
}
