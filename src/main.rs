//! skyforge - standalone machine production server
//!
//! Loads machine definitions, restores persisted machines (replaying
//! production missed while offline), and runs their timers until shutdown.

mod config;
mod display;

use anyhow::Result;
use config::ServerConfig;
use display::{LogDisplay, LogMarker};
use skyforge_machines::{unix_ms, JsonFileStore, MachineManager};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting skyforge v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load();
    let registry = config::load_machine_registry(&config.definitions_path);
    info!("Loaded {} machine definitions", registry.len());

    let store = Arc::new(JsonFileStore::new(&config.data_path));
    let manager = MachineManager::new(
        registry,
        store,
        Arc::new(LogDisplay),
        Arc::new(LogMarker),
        config.tick_duration_ms,
    );
    manager.load(unix_ms());
    info!("{} machines active", manager.active_count());

    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received, saving machines");
    manager.save();
    manager.shutdown();
    Ok(())
}
