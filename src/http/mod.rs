//! HTTP layer: listener-facing server and the request-lifecycle adapter.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → server.rs proxy_handler
//!         → sticky.rs (cookie extraction)
//!         → pool.pick → 503 when none
//!         → URI rewrite + X-Forwarded-* headers
//!         → upstream via hyper client (proxy_timeout_ms)
//!     → response.rs GuardedBody streams the body back, releasing the
//!       in-flight counter on completion, client abort, or failure
//!     → connect error / timeout: 502 + fast-path mark_unhealthy
//! ```

pub mod response;
pub mod server;
pub mod sticky;

pub use server::{AppState, HttpServer};
