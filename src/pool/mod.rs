//! Backend selection subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives → sticky id extracted (http/sticky.rs)
//!     → server_pool.rs pick():
//!         - healthy subset computed
//!         - sticky id wins when its target is healthy
//!         - otherwise algorithm.rs policy selects:
//!             ROUND_ROBIN / RANDOM over the healthy subset
//!             WEIGHTED_* over the expanded weighted sequence
//!     → backend.rs record returned, in-flight counter incremented
//!     → ConnectionGuard releases the counter exactly once on drop
//! ```
//!
//! # Design Decisions
//! - One mutex serializes pick/release/mark/replace; backend flags and
//!   counters are atomics readable without it
//! - The weighted sequence preserves configured order (same backend stays
//!   contiguous in the schedule)
//! - A single cursor serves both round-robin variants; switching selection
//!   base between calls may skip entries

pub mod algorithm;
pub mod backend;
pub mod server_pool;

pub use algorithm::Algorithm;
pub use backend::Backend;
pub use server_pool::{BackendSnapshot, ConnectionGuard, PoolSnapshot, ServerPool};
