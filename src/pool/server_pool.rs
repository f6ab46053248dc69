//! Server pool management.
//!
//! # Responsibilities
//! - Own the ordered set of backend records
//! - Apply the configured selection policy on `pick`
//! - Maintain the round-robin cursor and the expanded weighted sequence
//! - Expose connection-lifecycle hooks (`release`, `mark_unhealthy`)
//! - Swap the backend set in place on reconfiguration

use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::Serialize;

use crate::config::ServerConfig;
use crate::pool::algorithm::Algorithm;
use crate::pool::backend::Backend;

/// Mutable pool state. Composite mutation (selection cursor, weighted
/// sequence, backend set) is serialized behind one mutex; per-backend flags
/// and counters are atomics so snapshots read without it.
#[derive(Debug)]
struct PoolState {
    backends: Vec<Arc<Backend>>,
    /// Round-robin cursor, shared by both round-robin variants. Starts at -1
    /// so the first pick lands on the first entry of the selection base.
    rr_cursor: i64,
    /// Indices into `backends`, each healthy backend repeated `weight`
    /// times in configured order. Empty for non-weighted policies.
    weighted: Vec<usize>,
}

/// Owns the backend records and selects one per request.
#[derive(Debug)]
pub struct ServerPool {
    algorithm: Algorithm,
    state: Mutex<PoolState>,
}

impl ServerPool {
    /// Build a pool from the configured server list.
    pub fn new(servers: &[ServerConfig], algorithm: Algorithm) -> Self {
        let backends = servers
            .iter()
            .map(|s| Arc::new(Backend::new(s.host.clone(), s.port, s.weight)))
            .collect();

        let mut state = PoolState {
            backends,
            rr_cursor: -1,
            weighted: Vec::new(),
        };
        if algorithm.is_weighted() {
            rebuild_weighted(&mut state);
        }

        Self {
            algorithm,
            state: Mutex::new(state),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// All configured backends, healthy or not. Used by the prober.
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.state.lock().unwrap().backends.clone()
    }

    /// Select a healthy backend and increment its in-flight counter.
    ///
    /// A sticky id that resolves to a healthy backend wins over the policy.
    /// Returns `None` only when no healthy backend exists.
    pub fn pick(&self, sticky_id: Option<&str>) -> Option<Arc<Backend>> {
        let mut state = self.state.lock().unwrap();

        let healthy: Vec<usize> = (0..state.backends.len())
            .filter(|&i| state.backends[i].is_healthy())
            .collect();
        if healthy.is_empty() {
            return None;
        }

        // Sticky wins whenever its target is still healthy.
        let mut chosen = sticky_id.and_then(|id| {
            healthy
                .iter()
                .copied()
                .find(|&i| state.backends[i].id == id)
        });

        if chosen.is_none() {
            chosen = self.select(&mut state, &healthy);
        }
        if chosen.is_none() {
            tracing::warn!(
                algorithm = %self.algorithm,
                "Selection policy returned nothing despite healthy backends, picking first"
            );
            chosen = healthy.first().copied();
        }

        chosen.map(|i| {
            let backend = state.backends[i].clone();
            backend.acquire();
            backend
        })
    }

    /// Dispatch on the configured policy over the healthy subset.
    fn select(&self, state: &mut PoolState, healthy: &[usize]) -> Option<usize> {
        match self.algorithm {
            Algorithm::Random => {
                let i = rand::thread_rng().gen_range(0..healthy.len());
                Some(healthy[i])
            }
            Algorithm::RoundRobin => Some(healthy[advance_cursor(state, healthy.len())]),
            Algorithm::WeightedRandom => {
                let live = live_weighted(state);
                if live.is_empty() {
                    self.weighted_fallback(state, healthy)
                } else {
                    let i = rand::thread_rng().gen_range(0..live.len());
                    Some(live[i])
                }
            }
            Algorithm::WeightedRoundRobin => {
                let live = live_weighted(state);
                if live.is_empty() {
                    self.weighted_fallback(state, healthy)
                } else {
                    Some(live[advance_cursor(state, live.len())])
                }
            }
        }
    }

    /// Per-call fallback when the weighted sequence is empty while healthy
    /// backends remain. The configured algorithm is never mutated.
    fn weighted_fallback(&self, state: &mut PoolState, healthy: &[usize]) -> Option<usize> {
        tracing::warn!(
            algorithm = %self.algorithm,
            "Weighted sequence is empty, falling back to round-robin for this pick"
        );
        Some(healthy[advance_cursor(state, healthy.len())])
    }

    /// Decrement the in-flight counter for `id`. No-op when the id is
    /// unknown (e.g. the backend was removed by a reconfiguration while the
    /// request was still streaming) or the counter is already zero.
    pub fn release(&self, id: &str) {
        let state = self.state.lock().unwrap();
        if let Some(backend) = state.backends.iter().find(|b| b.id == id) {
            backend.release();
        }
    }

    /// Flip `id` unhealthy if it is currently healthy. Logs the transition
    /// and rebuilds the weighted sequence for weighted policies.
    pub fn mark_unhealthy(&self, id: &str, reason: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(backend) = state.backends.iter().find(|b| b.id == id) else {
            return;
        };
        if !backend.is_healthy() {
            return;
        }
        backend.set_healthy(false);
        tracing::warn!(backend = %id, reason = %reason, "Backend marked unhealthy");
        if self.algorithm.is_weighted() {
            rebuild_weighted(&mut state);
        }
    }

    /// Flip `id` healthy if it is currently unhealthy.
    pub fn mark_healthy(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(backend) = state.backends.iter().find(|b| b.id == id) else {
            return;
        };
        if backend.is_healthy() {
            return;
        }
        backend.set_healthy(true);
        tracing::info!(backend = %id, "Backend restored to rotation");
        if self.algorithm.is_weighted() {
            rebuild_weighted(&mut state);
        }
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<Backend>> {
        self.state
            .lock()
            .unwrap()
            .backends
            .iter()
            .find(|b| b.id == id)
            .cloned()
    }

    /// Rebuild the weighted sequence from the currently healthy backends.
    /// Invoked by the prober's post-sweep hook.
    pub fn rebuild_weighted(&self) {
        if self.algorithm.is_weighted() {
            rebuild_weighted(&mut self.state.lock().unwrap());
        }
    }

    /// Swap the backend set. Backends whose id survives keep their health
    /// flag and in-flight counter; new ids start healthy with zero. The
    /// round-robin cursor resets and the weighted sequence is rebuilt.
    pub fn replace_servers(&self, servers: &[ServerConfig]) {
        let mut state = self.state.lock().unwrap();

        let new_backends: Vec<Arc<Backend>> = servers
            .iter()
            .map(|s| {
                let backend = Backend::new(s.host.clone(), s.port, s.weight);
                if let Some(old) = state.backends.iter().find(|b| b.id == backend.id) {
                    backend.restore(old.is_healthy(), old.active_connections());
                }
                Arc::new(backend)
            })
            .collect();

        tracing::info!(
            previous = state.backends.len(),
            current = new_backends.len(),
            "Server pool replaced"
        );

        state.backends = new_backends;
        state.rr_cursor = -1;
        if self.algorithm.is_weighted() {
            rebuild_weighted(&mut state);
        }
    }

    /// Serializable view of the pool for the metrics endpoint.
    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().unwrap();
        let servers: Vec<BackendSnapshot> = state
            .backends
            .iter()
            .map(|b| BackendSnapshot {
                id: b.id.clone(),
                healthy: b.is_healthy(),
                weight: b.weight,
                active_connections: b.active_connections(),
            })
            .collect();
        let healthy = servers.iter().filter(|s| s.healthy).count();

        PoolSnapshot {
            total_servers: servers.len(),
            healthy_servers: healthy,
            unhealthy_servers: servers.len() - healthy,
            load_balancing_algorithm: self.algorithm.to_string(),
            servers,
        }
    }

    #[cfg(test)]
    fn clear_weighted_for_test(&self) {
        self.state.lock().unwrap().weighted.clear();
    }
}

/// Advance the shared cursor modulo the current selection base.
fn advance_cursor(state: &mut PoolState, base_len: usize) -> usize {
    state.rr_cursor = (state.rr_cursor + 1).rem_euclid(base_len as i64);
    state.rr_cursor as usize
}

/// The stored sequence filtered down to backends that are healthy right
/// now, so a flip is honored even before the next rebuild.
fn live_weighted(state: &PoolState) -> Vec<usize> {
    state
        .weighted
        .iter()
        .copied()
        .filter(|&i| state.backends[i].is_healthy())
        .collect()
}

fn rebuild_weighted(state: &mut PoolState) {
    let mut weighted = Vec::new();
    for (i, backend) in state.backends.iter().enumerate() {
        if backend.is_healthy() {
            for _ in 0..backend.weight {
                weighted.push(i);
            }
        }
    }
    state.weighted = weighted;
}

/// RAII token for one picked request. Dropping it releases the in-flight
/// count exactly once, whether the response finished, the client aborted,
/// or the upstream failed.
#[derive(Debug)]
pub struct ConnectionGuard {
    pool: Arc<ServerPool>,
    id: String,
}

impl ConnectionGuard {
    pub fn new(pool: Arc<ServerPool>, id: String) -> Self {
        Self { pool, id }
    }

    pub fn backend_id(&self) -> &str {
        &self.id
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.pool.release(&self.id);
    }
}

/// Serializable pool view, camelCase to match the metrics wire format.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSnapshot {
    pub total_servers: usize,
    pub healthy_servers: usize,
    pub unhealthy_servers: usize,
    pub load_balancing_algorithm: String,
    pub servers: Vec<BackendSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSnapshot {
    pub id: String,
    pub healthy: bool,
    pub weight: u32,
    pub active_connections: usize,
}
