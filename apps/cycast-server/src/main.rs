//! Cycast Server - standalone Icecast-compatible audio relay.
//!
//! Loads configuration, bootstraps the dataplane (ring buffer, broadcaster,
//! source acceptor, playlist feeder), serves the listener HTTP API, and
//! shuts everything down cleanly on Ctrl+C/SIGTERM.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cycast_core::bootstrap::DataPlane;
use cycast_core::{start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// Cycast Server - a single-mount Icecast-compatible relay.
#[derive(Parser, Debug)]
#[command(name = "cycast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CYCAST_LOG_LEVEL")]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Cycast Server v{}", env!("CARGO_PKG_VERSION"));

    let server_config =
        ServerConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    if let Err(err) = server_config.validate() {
        log::error!("configuration invalid: {err}");
        std::process::exit(1);
    }

    let core_config = server_config.to_core_config();

    let mut data_plane = match DataPlane::bootstrap(core_config).await {
        Ok(data_plane) => data_plane,
        Err(err) => {
            log::error!("failed to bootstrap dataplane: {err}");
            std::process::exit(1);
        }
    };

    log::info!(
        "source listening on {}:{}, listeners on {}:{}",
        data_plane.config.bind_host,
        data_plane.config.source_port,
        data_plane.config.bind_host,
        data_plane.config.listen_port
    );

    let app_state = AppState::from_data_plane(&data_plane);
    let server_handle = tokio::spawn(async move {
        if let Err(err) = start_server(app_state).await {
            log::error!("listener HTTP server error: {err}");
        }
    });

    shutdown_signal().await;
    log::info!("shutdown signal received, cleaning up...");

    data_plane.shutdown().await;
    server_handle.abort();

    log::info!("shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
