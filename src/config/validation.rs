//! Configuration validation logic.

use crate::config::schema::BalancerConfig;
use std::collections::HashSet;

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a BalancerConfig for semantic correctness.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. At least one listener and one backend.
    if config.port == 0 && !config.enable_https {
        errors.push(ValidationError(
            "no listener configured: port is 0 and enable_https is false".to_string(),
        ));
    }
    if config.servers.is_empty() {
        errors.push(ValidationError("servers must not be empty".to_string()));
    }

    // 2. Backend identities must be unique within the pool.
    let mut seen = HashSet::new();
    for server in &config.servers {
        if server.port == 0 {
            errors.push(ValidationError(format!(
                "server '{}' has port 0",
                server.host
            )));
        }
        if !seen.insert(format!("{}:{}", server.host, server.port)) {
            errors.push(ValidationError(format!(
                "duplicate server '{}:{}'",
                server.host, server.port
            )));
        }
    }

    // 3. TLS material is fatal only when HTTPS is the sole listener.
    if config.enable_https {
        let missing_material =
            config.ssl_key_path.is_none() || config.ssl_cert_path.is_none();
        if missing_material && config.port == 0 {
            errors.push(ValidationError(
                "enable_https requires ssl_key_path and ssl_cert_path when no HTTP listener is configured"
                    .to_string(),
            ));
        } else if missing_material {
            tracing::warn!(
                "enable_https is set but TLS material is missing, continuing with HTTP only"
            );
        }
    }

    // 4. Health check timing sanity.
    if config.health_check.enabled {
        if config.health_check.interval_ms == 0 {
            errors.push(ValidationError(
                "health_check.interval_ms must be > 0".to_string(),
            ));
        }
        if config.health_check.timeout_ms == 0 {
            errors.push(ValidationError(
                "health_check.timeout_ms must be > 0".to_string(),
            ));
        }
        if !config.health_check.path.starts_with('/') {
            errors.push(ValidationError(
                "health_check.path must start with '/'".to_string(),
            ));
        }
    }

    // 5. Metrics endpoint shape.
    if config.metrics.enabled && !config.metrics.endpoint.starts_with('/') {
        errors.push(ValidationError(
            "metrics.endpoint must start with '/'".to_string(),
        ));
    }

    if config.proxy_timeout_ms == 0 {
        tracing::warn!("proxy_timeout_ms is 0, upstream requests will time out immediately");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
