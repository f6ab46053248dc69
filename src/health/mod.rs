//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active sweeps (prober.rs):
//!     Timer fires → one concurrent probe per backend
//!     → verdicts applied to the pool (flip-only, with reason)
//!     → weighted sequence rebuilt
//!
//! Fast-path unhealth (http/server.rs):
//!     Upstream connect error or timeout observed on a live request
//!     → pool.mark_unhealthy immediately, without waiting for the sweep
//! ```
//!
//! # Design Decisions
//! - Probes run off the request path; picks never wait on the prober
//! - Probe failures are logged and swallowed, never surfaced to clients
//! - Probes use plain HTTP regardless of the client-facing listener

pub mod prober;

pub use prober::HealthProber;
