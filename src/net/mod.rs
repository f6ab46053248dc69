//! Listener-side networking.
//!
//! Plain HTTP is served directly by `axum::serve` in `http::server`; this
//! module covers the TLS-terminated listener.

pub mod tls;
