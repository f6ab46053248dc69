//! Binary entry point: configuration, runtime setup, listener wiring.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use load_balancer::config::{load_config, BalancerConfig};
use load_balancer::health::HealthProber;
use load_balancer::http::HttpServer;
use load_balancer::lifecycle::signals::{self, ReloadContext};
use load_balancer::lifecycle::{shutdown, Shutdown};
use load_balancer::net::tls;
use load_balancer::observability::metrics::{self, MetricsState};
use load_balancer::pool::{Algorithm, ServerPool};

#[derive(Parser)]
#[command(name = "load-balancer", version, about = "Layer-7 HTTP(S) load balancer")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "balancer.toml")]
    config: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "load_balancer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = match load_config(&args.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(path = %args.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    if config.num_workers > 0 {
        builder.worker_threads(config.num_workers);
    }
    let runtime = match builder.enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args.config, config)) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    config_path: PathBuf,
    config: BalancerConfig,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        algorithm = %config.load_balancing_algorithm,
        servers = config.servers.len(),
        "load-balancer starting"
    );

    let config = Arc::new(config);
    let algorithm = Algorithm::parse_or_default(&config.load_balancing_algorithm);
    let pool = Arc::new(ServerPool::new(&config.servers, algorithm));
    let requests_handled = Arc::new(AtomicU64::new(0));
    let started_at = Instant::now();

    let prober = Arc::new(HealthProber::new(pool.clone(), config.health_check.clone()));
    if config.health_check.enabled {
        prober.start();
    }

    let shutdown = Shutdown::new();
    signals::spawn_handlers(
        shutdown.clone(),
        &config.dynamic_config_reload_signal,
        ReloadContext {
            config_path,
            pool: pool.clone(),
            prober: prober.clone(),
            health_enabled: config.health_check.enabled,
        },
    )?;

    let server = Arc::new(HttpServer::new(
        config.clone(),
        pool.clone(),
        requests_handled.clone(),
    ));

    let mut listeners: Vec<tokio::task::JoinHandle<std::io::Result<()>>> = Vec::new();

    if config.port > 0 {
        let listener = TcpListener::bind(("0.0.0.0", config.port)).await?;
        let server = server.clone();
        let rx = shutdown.subscribe();
        listeners.push(tokio::spawn(async move { server.run(listener, rx).await }));
    }

    if config.enable_https {
        match tls_material(&config) {
            Some((cert_path, key_path)) => {
                let tls_config = tls::load_tls_config(cert_path, key_path)?;
                let listener = TcpListener::bind(("0.0.0.0", config.https_port)).await?;
                let app = server.router("https");
                let rx = shutdown.subscribe();
                listeners.push(tokio::spawn(async move {
                    tls::serve(listener, tls_config, app, rx).await
                }));
            }
            None if config.port == 0 => {
                return Err("enable_https set without TLS material and no HTTP listener".into());
            }
            None => {
                tracing::warn!("enable_https set without TLS material, serving HTTP only");
            }
        }
    }

    if listeners.is_empty() {
        return Err("no listener configured".into());
    }

    if config.metrics.enabled {
        let listener = TcpListener::bind(("0.0.0.0", config.metrics.port)).await?;
        let endpoint = config.metrics.endpoint.clone();
        let state = MetricsState {
            pool: pool.clone(),
            requests_handled: requests_handled.clone(),
            started_at,
        };
        let rx = shutdown.subscribe();
        listeners.push(tokio::spawn(async move {
            metrics::serve(listener, &endpoint, state, rx).await
        }));
    }

    // Park until a termination signal arrives.
    let mut shutdown_rx = shutdown.subscribe();
    let _ = shutdown_rx.recv().await;
    prober.stop();
    tracing::info!("Draining in-flight requests");

    let drain = async {
        for task in listeners {
            let _ = task.await;
        }
    };
    match tokio::time::timeout(shutdown::DRAIN_GRACE, drain).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        }
        Err(_) => {
            tracing::warn!("Drain deadline exceeded, forcing exit");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn tls_material(config: &BalancerConfig) -> Option<(&str, &str)> {
    match (&config.ssl_cert_path, &config.ssl_key_path) {
        (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
        _ => None,
    }
}
