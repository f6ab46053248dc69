//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On the reload signal:
//!     lifecycle/signals.rs re-runs loader.rs
//!     → the new server list replaces the pool in place
//!     → everything else keeps the boot-time configuration
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - An unknown algorithm name is a warning, not an error; missing TLS
//!   material is fatal only when HTTPS is the sole listener

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BalancerConfig, CookieOptions, HealthCheckConfig, MetricsConfig, ServerConfig,
    StickySessionConfig,
};
