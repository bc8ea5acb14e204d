//! # Trixel Lookup Runtime
//!
//! Entry point for the trixel directory process.
//!
//! Configuration file: first argument, or `TLS_CONFIG`. Without either,
//! defaults plus `TLS_*` environment overrides are used.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tl_runtime::{DirectoryRuntime, RuntimeConfig};

fn config_path() -> Option<PathBuf> {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("TLS_CONFIG").map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config =
        RuntimeConfig::load(config_path().as_deref()).context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Trixel Lookup Service v{}", tl_directory::VERSION);
    info!("===========================================");
    if config.directory.allow_insecure_transport {
        info!("Plain transport registrations are ENABLED; do not use in production");
    }

    let mut runtime = DirectoryRuntime::new(config)?;
    runtime.start();

    info!("Directory is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
