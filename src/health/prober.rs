//! Active health probing.
//!
//! # Responsibilities
//! - Periodically probe every configured backend over plain HTTP
//! - Flip pool health flags when a probe verdict changes
//! - Rebuild the weighted sequence after each sweep

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::pool::{Backend, ServerPool};

/// Periodic prober driving the pool's health flags.
///
/// `start` is idempotent: a running timer is cleared and restarted. `stop`
/// cancels the timer without waiting for in-flight probes.
pub struct HealthProber {
    pool: Arc<ServerPool>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Empty<Bytes>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthProber {
    pub fn new(pool: Arc<ServerPool>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            pool,
            config,
            client,
            task: Mutex::new(None),
        }
    }

    /// Start the sweep timer. The first sweep fires immediately, then every
    /// `interval_ms`.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let prober = self.clone();
        *task = Some(tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_millis(prober.config.interval_ms));
            loop {
                interval.tick().await;
                prober.sweep().await;
            }
        }));

        tracing::info!(
            interval_ms = self.config.interval_ms,
            path = %self.config.path,
            "Health prober started"
        );
    }

    /// Cancel the sweep timer.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
            tracing::info!("Health prober stopped");
        }
    }

    /// Probe every backend concurrently, then apply flips and rebuild the
    /// weighted sequence once all outcomes are in.
    pub async fn sweep(&self) {
        let backends = self.pool.backends();

        let probes = backends.iter().map(|backend| {
            let backend = backend.clone();
            async move {
                let verdict = self.probe(&backend).await;
                (backend, verdict)
            }
        });

        for (backend, verdict) in join_all(probes).await {
            match verdict {
                Ok(()) if !backend.is_healthy() => self.pool.mark_healthy(&backend.id),
                Err(reason) if backend.is_healthy() => {
                    self.pool.mark_unhealthy(&backend.id, &reason)
                }
                _ => {}
            }
        }

        // Post-sweep hook: no-op for non-weighted policies.
        self.pool.rebuild_weighted();
    }

    /// One probe. `Ok` means the backend passed: expected status, and the
    /// expected body substring when one is configured. Connect errors, read
    /// errors, and timeouts all fail the probe.
    async fn probe(&self, backend: &Backend) -> Result<(), String> {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        match time::timeout(timeout, self.probe_once(backend)).await {
            Ok(result) => result,
            Err(_) => Err(format!("probe timed out after {}ms", self.config.timeout_ms)),
        }
    }

    async fn probe_once(&self, backend: &Backend) -> Result<(), String> {
        let uri: Uri = format!("http://{}{}", backend.id, self.config.path)
            .parse()
            .map_err(|e| format!("invalid probe uri: {}", e))?;
        let method = Method::from_bytes(self.config.method.as_bytes())
            .map_err(|e| format!("invalid probe method: {}", e))?;

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Empty::new())
            .map_err(|e| format!("probe request build failed: {}", e))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| format!("probe request failed: {}", e))?;

        let status = response.status();
        if status.as_u16() != self.config.expect_status {
            return Err(format!(
                "unexpected status {} (expected {})",
                status.as_u16(),
                self.config.expect_status
            ));
        }

        if let Some(expected) = &self.config.expect_body {
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| format!("probe body read failed: {}", e))?
                .to_bytes();
            if !String::from_utf8_lossy(&body).contains(expected.as_str()) {
                return Err(format!("probe body missing expected substring '{}'", expected));
            }
        }

        Ok(())
    }
}

impl Drop for HealthProber {
    fn drop(&mut self) {
        if let Some(handle) = self.task.lock().unwrap().take() {
            handle.abort();
        }
    }
}
