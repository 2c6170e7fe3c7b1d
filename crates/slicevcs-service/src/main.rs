#![warn(missing_docs)]

//! Standalone slicevcs server: coordinator plus the HTTP dispatch layer.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use slicevcs_core::objectstore::MemoryObjectStore;
use slicevcs_core::Coordinator;
use slicevcs_service::server::{router, AppState};
use slicevcs_service::ServerConfig;

/// Command-line arguments for the server.
#[derive(Debug, Parser)]
#[command(name = "slicevcs-server", about = "Sliced monorepo version-control server")]
struct Cli {
    /// Path to a TOML or JSON configuration file.
    #[arg(long, default_value = "slicevcs.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = if cli.config.exists() {
        ServerConfig::from_file(&cli.config)?
    } else {
        tracing::warn!(
            "Config file not found, using defaults: {}",
            cli.config.display()
        );
        ServerConfig::default()
    };

    let store = Arc::new(MemoryObjectStore::new());
    let coordinator = Arc::new(Coordinator::new(store, config.key_prefix.clone())?);
    coordinator.initialize_root_slice()?;

    let state = AppState::new(coordinator, &config);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "slicevcs server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
