//! # beacon-agent
//!
//! Beacon telemetry server binary: loads settings, starts the HTTP/WebSocket
//! server, and tears it down in order on SIGINT or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use beacon_server::{BeaconServer, ServerConfig};
use beacon_settings::{BeaconSettings, LogLevel};
use beacon_store::TelemetryService;
use clap::Parser;

/// Beacon telemetry server.
#[derive(Parser, Debug)]
#[command(name = "beacon-agent", about = "Beacon telemetry server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.beacon/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Apply command-line overrides on top of loaded settings.
    fn apply(&self, settings: &mut BeaconSettings) -> Result<()> {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level =
                LogLevel::parse(level).with_context(|| format!("unknown log level: {level}"))?;
        }
        beacon_settings::validate(settings).context("invalid command-line overrides")?;
        Ok(())
    }
}

fn load(cli: &Cli) -> Result<BeaconSettings> {
    let path = cli.settings.clone().unwrap_or_else(beacon_settings::settings_path);
    let mut settings = beacon_settings::load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    cli.apply(&mut settings)?;
    Ok(settings)
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate()).context("failed to listen for SIGTERM")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("failed to listen for ctrl-c")?,
        _ = term.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    beacon_logging::init_subscriber(settings.logging.level.as_str(), settings.logging.format);

    let service = Arc::new(TelemetryService::in_memory());
    let server = BeaconServer::new(ServerConfig::from_settings(&settings), service);

    let (addr, handle) = server.listen().await.context("failed to bind server")?;
    tracing::info!(
        grace_ms = u64::try_from(server.config().push.grace_period.as_millis()).unwrap_or(u64::MAX),
        "beacon agent listening on http://{addr}"
    );

    wait_for_signal().await?;

    tracing::info!("shutting down");
    match server.shutdown_gracefully(handle).await {
        Ok(report) => tracing::info!(
            closed = report.closed,
            failed = report.failed,
            already_closed = report.already_closed,
            "shutdown complete"
        ),
        Err(e) => tracing::warn!(error = %e, "shutdown finished with open push streams"),
    }
    Ok(())
}
