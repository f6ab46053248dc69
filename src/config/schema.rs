//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! balancer. All types derive Serde traits for deserialization from config
//! files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// HTTP listener port. 0 disables the plain HTTP listener.
    pub port: u16,

    /// HTTPS listener port, used when `enable_https` is set.
    pub https_port: u16,

    /// Terminate TLS on `https_port`.
    pub enable_https: bool,

    /// Path to the PEM private key for TLS termination.
    pub ssl_key_path: Option<String>,

    /// Path to the PEM certificate chain for TLS termination.
    pub ssl_cert_path: Option<String>,

    /// Runtime worker threads. 0 uses the runtime default.
    pub num_workers: usize,

    /// Initial backend list.
    pub servers: Vec<ServerConfig>,

    /// One of ROUND_ROBIN, RANDOM, WEIGHTED_ROUND_ROBIN, WEIGHTED_RANDOM.
    /// Unknown values warn and default to WEIGHTED_ROUND_ROBIN.
    pub load_balancing_algorithm: String,

    /// Sticky session overlay.
    pub sticky_session: StickySessionConfig,

    /// Active health checking.
    pub health_check: HealthCheckConfig,

    /// Metrics snapshot endpoint.
    pub metrics: MetricsConfig,

    /// Overall upstream request timeout in milliseconds.
    pub proxy_timeout_ms: u64,

    /// Upstream connect timeout in milliseconds.
    pub proxy_connect_timeout_ms: u64,

    /// Signal that triggers a config re-read and pool replacement.
    pub dynamic_config_reload_signal: String,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            https_port: 8443,
            enable_https: false,
            ssl_key_path: None,
            ssl_cert_path: None,
            num_workers: 0,
            servers: Vec::new(),
            load_balancing_algorithm: "WEIGHTED_ROUND_ROBIN".to_string(),
            sticky_session: StickySessionConfig::default(),
            health_check: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
            proxy_timeout_ms: 30_000,
            proxy_connect_timeout_ms: 5_000,
            dynamic_config_reload_signal: "SIGHUP".to_string(),
        }
    }
}

/// One upstream server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Hostname or IP address.
    pub host: String,

    /// Port.
    pub port: u16,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Sticky session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StickySessionConfig {
    /// Enable the sticky-session overlay.
    pub enabled: bool,

    /// Cookie carrying the backend identity.
    pub cookie_name: String,

    /// Attributes emitted on the session cookie.
    pub cookie_options: CookieOptions,
}

impl Default for StickySessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cookie_name: "lb_sticky_session".to_string(),
            cookie_options: CookieOptions::default(),
        }
    }
}

/// Attributes for the sticky-session cookie.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieOptions {
    pub http_only: bool,
    pub path: String,
    pub max_age_secs: u64,
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            path: "/".to_string(),
            max_age_secs: 3600,
            secure: false,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Sweep interval in milliseconds.
    pub interval_ms: u64,

    /// Per-probe timeout in milliseconds.
    pub timeout_ms: u64,

    /// Path to probe.
    pub path: String,

    /// HTTP method for probes.
    pub method: String,

    /// Status code a healthy backend must return.
    pub expect_status: u16,

    /// Optional substring the probe response body must contain.
    pub expect_body: Option<String>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 10_000,
            timeout_ms: 5_000,
            path: "/health".to_string(),
            method: "GET".to_string(),
            expect_status: 200,
            expect_body: None,
        }
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the metrics listener.
    pub enabled: bool,

    /// Metrics listener port.
    pub port: u16,

    /// Path serving the snapshot.
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
            endpoint: "/metrics".to_string(),
        }
    }
}
