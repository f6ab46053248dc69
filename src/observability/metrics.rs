//! Metrics snapshot endpoint.
//!
//! One worker exposes a dedicated HTTP listener returning a JSON snapshot
//! of the pool and process. Wire keys are camelCase.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::pool::{PoolSnapshot, ServerPool};

/// State shared with the snapshot handler.
#[derive(Clone)]
pub struct MetricsState {
    pub pool: Arc<ServerPool>,
    pub requests_handled: Arc<AtomicU64>,
    pub started_at: Instant,
}

/// The snapshot served at the metrics endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub worker_pid: u32,
    pub requests_handled: u64,
    pub server_pool: PoolSnapshot,
    pub uptime_seconds: u64,
    pub memory_usage: u64,
}

/// Build the metrics router serving `GET <endpoint>`.
pub fn router(endpoint: &str, state: MetricsState) -> Router {
    Router::new()
        .route(endpoint, get(snapshot_handler))
        .with_state(state)
}

/// Serve the metrics listener until shutdown fires.
pub async fn serve(
    listener: TcpListener,
    endpoint: &str,
    state: MetricsState,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, endpoint = %endpoint, "Metrics listener started");

    axum::serve(listener, router(endpoint, state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}

async fn snapshot_handler(State(state): State<MetricsState>) -> Json<MetricsSnapshot> {
    Json(MetricsSnapshot {
        worker_pid: std::process::id(),
        requests_handled: state.requests_handled.load(Ordering::Relaxed),
        server_pool: state.pool.snapshot(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        memory_usage: resident_memory_bytes(),
    })
}

/// Resident set size in bytes, 0 where the proc filesystem is unavailable.
fn resident_memory_bytes() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(statm) = std::fs::read_to_string("/proc/self/statm") {
            if let Some(resident_pages) = statm
                .split_whitespace()
                .nth(1)
                .and_then(|v| v.parse::<u64>().ok())
            {
                return resident_pages * 4096;
            }
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::pool::Algorithm;

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let pool = Arc::new(ServerPool::new(
            &[ServerConfig {
                host: "10.0.0.1".into(),
                port: 3001,
                weight: 2,
            }],
            Algorithm::WeightedRoundRobin,
        ));
        let snapshot = MetricsSnapshot {
            worker_pid: 42,
            requests_handled: 7,
            server_pool: pool.snapshot(),
            uptime_seconds: 12,
            memory_usage: 4096,
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["workerPid"], 42);
        assert_eq!(json["requestsHandled"], 7);
        assert_eq!(json["uptimeSeconds"], 12);
        assert_eq!(json["serverPool"]["totalServers"], 1);
        assert_eq!(json["serverPool"]["healthyServers"], 1);
        assert_eq!(
            json["serverPool"]["loadBalancingAlgorithm"],
            "WEIGHTED_ROUND_ROBIN"
        );
        let server = &json["serverPool"]["servers"][0];
        assert_eq!(server["id"], "10.0.0.1:3001");
        assert_eq!(server["healthy"], true);
        assert_eq!(server["weight"], 2);
        assert_eq!(server["activeConnections"], 0);
    }
}
