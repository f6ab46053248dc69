//! Layer-7 HTTP(S) Load Balancer
//!
//! Accepts client connections, picks a healthy backend from the configured
//! pool using the selected policy, forwards the request, and streams the
//! response back. An active prober removes failed backends from rotation
//! and restores them when they recover.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                LOAD BALANCER                  │
//!                      │                                               │
//!   Client Request     │  ┌──────────┐     ┌─────────────────────┐    │
//!   ──────────────────▶│  │ http/tls │────▶│ request adapter      │    │
//!                      │  │ listener │     │ (sticky → pick →     │    │
//!                      │  └──────────┘     │  forward → release)  │    │
//!                      │                   └─────────┬────────────┘    │
//!                      │                             ▼                 │
//!                      │                   ┌─────────────────────┐    │     Backend
//!   Client Response    │                   │ server pool          │───┼───▶ Servers
//!   ◀──────────────────┼───────────────────│ + selection policies │    │
//!                      │                   └─────────▲────────────┘    │
//!                      │                             │                 │
//!                      │  ┌──────────┐    ┌──────────┴───────────┐    │
//!                      │  │ config + │    │ health prober        │    │
//!                      │  │ signals  │    │ (periodic sweeps)    │    │
//!                      │  └──────────┘    └──────────────────────┘    │
//!                      └──────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod pool;

// Traffic management
pub mod health;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::BalancerConfig;
pub use error::ProxyError;
pub use health::HealthProber;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pool::{Algorithm, ServerPool};
