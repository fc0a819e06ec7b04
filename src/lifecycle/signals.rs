//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM/SIGINT trigger graceful shutdown; a second one forces exit
//! - SIGHUP only logs: reload is driven by the config file watcher

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Wait for OS signals until shutdown completes.
#[cfg(unix)]
pub async fn listen(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;

    loop {
        let name = tokio::select! {
            _ = terminate.recv() => "SIGTERM",
            _ = interrupt.recv() => "SIGINT",
            _ = hangup.recv() => {
                tracing::info!("SIGHUP received; config reloads follow the watched file");
                continue;
            }
        };

        if !shutdown.trigger() {
            tracing::warn!(signal = name, "Second stop signal, exiting immediately");
            std::process::exit(1);
        }
        tracing::info!(signal = name, "Graceful shutdown requested");
    }
}

/// Wait for Ctrl+C until shutdown completes.
#[cfg(not(unix))]
pub async fn listen(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    loop {
        tokio::signal::ctrl_c().await?;
        if !shutdown.trigger() {
            tracing::warn!("Second Ctrl+C, exiting immediately");
            std::process::exit(1);
        }
        tracing::info!("Graceful shutdown requested");
    }
}
