//! # beacon
//!
//! Gateway binary: loads settings, installs logging and the metrics
//! recorder, then serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use beacon_logging::LoggingConfig;
use beacon_server::{GatewayServer, ServerConfig};
use beacon_settings::{BeaconSettings, LoggingSettings};
use clap::Parser;

/// WebSocket notification gateway.
#[derive(Parser, Debug)]
#[command(name = "beacon", about = "WebSocket notification gateway")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file. Defaults to `$BEACON_SETTINGS` or `~/.beacon/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Default log level (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, settings: &mut BeaconSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn logging_config(settings: &LoggingSettings) -> LoggingConfig {
    LoggingConfig {
        level: settings.level.clone(),
        modules: settings
            .modules
            .iter()
            .map(|(module, level)| (module.clone(), level.clone()))
            .collect(),
        format: match settings.format {
            beacon_settings::LogFormat::Pretty => beacon_logging::LogFormat::Pretty,
            beacon_settings::LogFormat::Json => beacon_logging::LogFormat::Json,
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(beacon_settings::settings_path);
    let mut settings = beacon_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    beacon_logging::init_logging(&logging_config(&settings.logging))
        .context("Failed to initialize logging")?;

    let mut server = GatewayServer::new(ServerConfig::from(&settings.server));
    match beacon_server::metrics::install_recorder() {
        Ok(handle) => server = server.with_metrics(handle),
        Err(e) => tracing::warn!(error = %e, "metrics recorder unavailable, /metrics disabled"),
    }

    let addr = server.start().await.context("Failed to start server")?;
    tracing::info!("beacon listening on ws://{addr}/ws");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    server.wait_until_stopped().await;
    tracing::info!("shutdown complete");
    Ok(())
}
