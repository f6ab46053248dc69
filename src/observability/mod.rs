//! Observability: structured logging is initialized in `main`; this module
//! hosts the metrics snapshot listener.

pub mod metrics;

pub use metrics::{MetricsSnapshot, MetricsState};
