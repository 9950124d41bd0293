//! swift-exporter - Prometheus exporter for OpenStack Swift storage nodes.
//!
//! Periodically collects node, drive and Swift daemon statistics and serves
//! them on `GET /metrics`.

use anyhow::Result;
use clap::Parser;
use swift_exporter::{app::App, cli::Cli, config::Config, Module};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_env_filter(EnvFilter::new("error")).init();
        error!("Failed to load configuration: {}", err);
        std::process::exit(1);
    });

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("swift-exporter {} starting up...", env!("CARGO_PKG_VERSION"));
    info!("-------------------- Configuration --------------------");
    info!("Listen Address: {}", config.listen_address);
    info!("Log Level: {}", config.log_level);
    info!("Self Metrics: {}", config.self_metrics);
    info!("Swift Drive Root: {}", config.swift_drive_root.display());
    info!("Command Timeout: {}s", config.collector_timeout_seconds);
    let enabled: Vec<_> = Module::ALL
        .iter()
        .filter(|m| config.is_enabled(**m))
        .map(|m| m.key())
        .collect();
    info!("Enabled Modules: {}", enabled.join(", "));
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let app = App::builder(config).build(shutdown_rx).await?;
    let app_handle = tokio::spawn(app.run());

    shutdown_signal().await;
    info!("Shutdown signal received. Shutting down gracefully...");
    shutdown_tx.send(true).ok();

    app_handle.await??;
    info!("Exiting.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
