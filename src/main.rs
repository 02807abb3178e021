//! Asset Gate
//!
//! Main entry point for the gated static file server.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use asset_gate::asset::AssetGateServer;
use asset_gate::config::ConfigLoader;
use asset_gate::logging::{init_fallback_logging, LoggingConfig, LoggingSystem};

/// Serve a CMS document root through the access gate
#[derive(Debug, Parser)]
#[command(name = "asset-gate", version, about)]
struct Args {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Document root, overriding the configuration
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Write a configuration template (without secrets) and exit
    #[arg(long)]
    init_config: bool,

    /// Debug-level console logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }

    if args.init_config {
        let path = loader.file_path();
        asset_gate::config::GateConfig::default()
            .write_template(&path)
            .await
            .with_context(|| format!("writing configuration template to {:?}", path))?;
        println!("Wrote configuration template to {}", path.display());
        return Ok(());
    }

    let mut config = loader.load().context("loading configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(root) = args.root {
        config.document_root = root;
    }

    let logging_config = if args.verbose {
        LoggingConfig::development()
    } else {
        config.logging.clone()
    };

    // Kept alive for the whole run so file output is flushed on exit
    let _logging_system = match LoggingSystem::init(logging_config) {
        Ok(system) => Some(system),
        Err(e) => {
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            init_fallback_logging();
            None
        }
    };

    // logged here: no subscriber is installed while the loader runs
    match &config.source {
        Some(path) => tracing::info!("Loaded configuration from {:?}", path),
        None => tracing::info!("No configuration file at {:?}, using defaults", loader.file_path()),
    }
    tracing::info!(
        "Starting asset gate v{} serving {:?}",
        env!("CARGO_PKG_VERSION"),
        config.document_root
    );

    let result = match AssetGateServer::new(config) {
        Ok(server) => server.start().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if e.is_startup_failure() {
            tracing::error!("Asset gate failed to start: {}", e);
        } else {
            tracing::error!("Asset gate stopped with an error: {}", e);
        }
        return Err(e.into());
    }

    Ok(())
}
