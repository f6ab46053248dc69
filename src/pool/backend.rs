//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track health state (flipped by the prober and the upstream-error fast path)
//! - Track active connections for the metrics snapshot

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A single upstream server.
#[derive(Debug)]
pub struct Backend {
    /// Stable identity, `"host:port"`. Doubles as the sticky-cookie value
    /// and as the retention key across reconfigurations.
    pub id: String,
    /// Hostname or IP used for probing and forwarding.
    pub host: String,
    /// Port used for probing and forwarding.
    pub port: u16,
    /// Weight for the weighted policies. Always >= 1.
    pub weight: u32,
    /// Health flag. Starts true.
    healthy: AtomicBool,
    /// Number of requests currently in flight through this backend.
    active_connections: AtomicUsize,
}

impl Backend {
    /// Create a new backend, healthy with no connections.
    pub fn new(host: impl Into<String>, port: u16, weight: u32) -> Self {
        let host = host.into();
        Self {
            id: format!("{}:{}", host, port),
            host,
            port,
            weight: weight.max(1),
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Check the current health flag.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    /// Set the health flag.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    /// Get the current number of in-flight requests.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment the in-flight counter. Called once per successful pick.
    pub(crate) fn acquire(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the in-flight counter, clamped at zero.
    pub(crate) fn release(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Restore in-flight state carried over from a previous configuration.
    pub(crate) fn restore(&self, healthy: bool, active_connections: usize) {
        self.healthy.store(healthy, Ordering::Relaxed);
        self.active_connections
            .store(active_connections, Ordering::Relaxed);
    }
}
