//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast to listeners and prober
//!     → stop accepting → drain up to DRAIN_GRACE → exit 0
//!     → deadline exceeded → forced exit 1
//!
//! Reload (signals.rs):
//!     configured signal (default SIGHUP) → re-read config file
//!     → prober stopped → pool.replace_servers → prober restarted
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
