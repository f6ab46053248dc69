//! OS signal handling.
//!
//! # Responsibilities
//! - SIGINT / SIGTERM trigger graceful shutdown
//! - The configured reload signal re-reads the config file and replaces
//!   the server pool in place, preserving surviving backend state

use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};

use crate::config::load_config;
use crate::health::HealthProber;
use crate::lifecycle::shutdown::Shutdown;
use crate::pool::ServerPool;

/// Everything a reload needs to swap the pool.
pub struct ReloadContext {
    pub config_path: PathBuf,
    pub pool: Arc<ServerPool>,
    pub prober: Arc<HealthProber>,
    pub health_enabled: bool,
}

/// Map the configured signal name onto a kind. Unknown names warn and fall
/// back to SIGHUP.
fn reload_signal_kind(name: &str) -> SignalKind {
    match name {
        "SIGHUP" => SignalKind::hangup(),
        "SIGUSR1" => SignalKind::user_defined1(),
        "SIGUSR2" => SignalKind::user_defined2(),
        other => {
            tracing::warn!(signal = %other, "Unknown reload signal, defaulting to SIGHUP");
            SignalKind::hangup()
        }
    }
}

/// Install the shutdown and reload signal handlers.
pub fn spawn_handlers(
    shutdown: Shutdown,
    reload_signal: &str,
    ctx: ReloadContext,
) -> std::io::Result<()> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("SIGINT received, shutting down"),
            _ = terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
        }
        shutdown.trigger();
    });

    let mut reload = signal(reload_signal_kind(reload_signal))?;
    tokio::spawn(async move {
        while reload.recv().await.is_some() {
            reload_pool(&ctx);
        }
    });

    Ok(())
}

/// Re-read the config file and swap the backend set. A failed read keeps
/// the current pool untouched.
fn reload_pool(ctx: &ReloadContext) {
    match load_config(&ctx.config_path) {
        Ok(new_config) => {
            ctx.prober.stop();
            ctx.pool.replace_servers(&new_config.servers);
            if ctx.health_enabled {
                ctx.prober.start();
            }
            tracing::info!(
                servers = new_config.servers.len(),
                "Configuration reloaded, server pool replaced"
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Reload failed, keeping current server pool");
        }
    }
}
