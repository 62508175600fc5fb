//! # fanout-agent
//!
//! Binary entry point: resolves settings, initializes logging and metrics,
//! serves the hub and shuts it down on Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fanout_server::{FanoutServer, ServerConfig};
use fanout_settings::{FanoutSettings, ServerSettings};
use tracing::{info, warn};

/// Real-time WebSocket fan-out hub.
#[derive(Parser, Debug)]
#[command(name = "fanout", about = "Real-time WebSocket fan-out hub")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.fanout/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// Load settings and apply command-line overrides.
    fn resolve_settings(&self) -> Result<FanoutSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(fanout_settings::settings_path);
        let mut settings = fanout_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        Ok(settings)
    }
}

fn server_config(settings: &ServerSettings) -> ServerConfig {
    ServerConfig {
        host: settings.host.clone(),
        port: settings.port,
        mailbox_capacity: settings.mailbox_capacity,
        max_message_size: settings.max_message_size,
        pong_wait_ms: settings.pong_wait_ms,
        write_wait_ms: settings.write_wait_ms,
        coalesce: settings.coalesce,
        command_queue_capacity: settings.command_queue_capacity,
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                let _ = sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;
    logging::init_subscriber(&settings.logging);

    let metrics_handle = fanout_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = FanoutServer::new(server_config(&settings.server)).with_metrics(metrics_handle);

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!(
        mailbox_capacity = settings.server.mailbox_capacity,
        max_message_size = settings.server.max_message_size,
        "fanout hub listening on ws://{addr}/ws"
    );

    shutdown_signal().await;
    info!("shutting down");
    server
        .shutdown()
        .graceful_shutdown(
            vec![handle],
            Some(Duration::from_millis(settings.server.shutdown_timeout_ms)),
        )
        .await;
    Ok(())
}
