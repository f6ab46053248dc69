//! Shutdown coordination.

use std::time::Duration;

use tokio::sync::broadcast;

/// Grace period for draining in-flight requests before forced exit.
pub const DRAIN_GRACE: Duration = Duration::from_secs(10);

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
