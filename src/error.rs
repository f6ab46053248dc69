//! Client-facing error taxonomy.
//!
//! All proxy failures become plaintext HTTP responses; stack traces and
//! upstream error details never reach the client beyond the reason phrase.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced on the request path.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// `pick` found no healthy backend.
    #[error("no healthy upstream available")]
    NoHealthyBackend,

    /// Connection refused, DNS failure, or connect timeout.
    #[error("upstream connect failed: {0}")]
    UpstreamConnect(String),

    /// Overall proxy timeout exceeded before response headers arrived.
    #[error("upstream request timed out after {0}ms")]
    UpstreamTimeout(u64),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyBackend => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamConnect(_) | ProxyError::UpstreamTimeout(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
