//! HTTP server setup and the request-lifecycle adapter.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Extract the sticky id, pick a backend, emit the session cookie
//! - Rewrite the URI and the forwarded headers, stream to the upstream
//! - Convert upstream failures into 502/503 and feed the fast-path
//!   unhealth signal back into the pool

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderValue, Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::BalancerConfig;
use crate::error::ProxyError;
use crate::http::response::GuardedBody;
use crate::http::sticky;
use crate::pool::{ConnectionGuard, ServerPool};

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BalancerConfig>,
    pub pool: Arc<ServerPool>,
    pub client: Client<HttpConnector, Body>,
    pub requests_handled: Arc<AtomicU64>,
    /// Scheme reported in X-Forwarded-Proto, per listener.
    pub proto: &'static str,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(
        config: Arc<BalancerConfig>,
        pool: Arc<ServerPool>,
        requests_handled: Arc<AtomicU64>,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_millis(
            config.proxy_connect_timeout_ms,
        )));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            state: AppState {
                config,
                pool,
                client,
                requests_handled,
                proto: "http",
            },
        }
    }

    /// Build the router for one listener. `proto` feeds X-Forwarded-Proto.
    pub fn router(&self, proto: &'static str) -> Router {
        let state = AppState {
            proto,
            ..self.state.clone()
        };
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve plain HTTP on the given listener until shutdown fires, then
    /// drain in-flight connections.
    pub async fn run(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP listener started");

        let app = self
            .router("http")
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!(address = %addr, "HTTP listener stopped");
        Ok(())
    }
}

/// The request-lifecycle adapter: one invocation per client request.
pub(crate) async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
) -> Response {
    state.requests_handled.fetch_add(1, Ordering::Relaxed);

    let sticky_config = &state.config.sticky_session;
    let sticky_id = if sticky_config.enabled {
        sticky::extract(request.headers(), &sticky_config.cookie_name)
    } else {
        None
    };

    let Some(backend) = state.pool.pick(sticky_id.as_deref()) else {
        tracing::warn!(path = %request.uri().path(), "No healthy backends available");
        return ProxyError::NoHealthyBackend.into_response();
    };

    // Released exactly once when dropped: on the error paths below, or with
    // the response body once it finishes streaming (or the client aborts).
    let guard = ConnectionGuard::new(state.pool.clone(), backend.id.clone());

    let needs_cookie = sticky_config.enabled && sticky_id.as_deref() != Some(backend.id.as_str());

    let original_host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| request.uri().authority().map(|a| a.to_string()));

    if let Err(response) = rewrite_uri(&mut request, &backend.id) {
        return response;
    }
    apply_forwarded_headers(
        request.headers_mut(),
        client_addr,
        state.proto,
        original_host.as_deref(),
    );

    let timeout_ms = state.config.proxy_timeout_ms;
    match tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        state.client.request(request),
    )
    .await
    {
        Ok(Ok(upstream)) => {
            let (parts, body) = upstream.into_parts();
            let mut response =
                Response::from_parts(parts, Body::new(GuardedBody::new(body, guard)));

            if needs_cookie {
                if let Some(value) = sticky::session_cookie(
                    &sticky_config.cookie_name,
                    &backend.id,
                    &sticky_config.cookie_options,
                ) {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
            }
            response
        }
        Ok(Err(e)) => {
            tracing::error!(backend = %backend.id, error = %e, "Upstream request failed");
            let error = ProxyError::UpstreamConnect(e.to_string());
            state.pool.mark_unhealthy(&backend.id, &error.to_string());
            drop(guard);
            error.into_response()
        }
        Err(_) => {
            tracing::error!(backend = %backend.id, timeout_ms, "Upstream request timed out");
            let error = ProxyError::UpstreamTimeout(timeout_ms);
            state.pool.mark_unhealthy(&backend.id, &error.to_string());
            drop(guard);
            error.into_response()
        }
    }
}

/// Point the request at `http://<backend>` keeping path and query.
fn rewrite_uri(request: &mut Request<Body>, backend_id: &str) -> Result<(), Response> {
    let mut parts = request.uri().clone().into_parts();
    parts.scheme = Some(Scheme::HTTP);

    match backend_id.parse::<Authority>() {
        Ok(authority) => parts.authority = Some(authority),
        Err(_) => {
            return Err((StatusCode::BAD_GATEWAY, "Invalid backend address").into_response());
        }
    }

    if parts.path_and_query.is_none() {
        parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }

    match Uri::from_parts(parts) {
        Ok(uri) => {
            *request.uri_mut() = uri;
            Ok(())
        }
        Err(_) => Err((StatusCode::INTERNAL_SERVER_ERROR, "URI rewrite failed").into_response()),
    }
}

/// Extend X-Forwarded-For and set the remaining forwarded headers. A
/// request id is attached when the client did not send one.
fn apply_forwarded_headers(
    headers: &mut HeaderMap,
    client_addr: SocketAddr,
    proto: &'static str,
    original_host: Option<&str>,
) {
    let client_ip = client_addr.ip().to_string();
    let forwarded_for = match headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        Some(existing) => format!("{}, {}", existing, client_ip),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }

    headers.insert("x-forwarded-proto", HeaderValue::from_static(proto));

    if let Some(host) = original_host {
        if let Ok(value) = HeaderValue::from_str(host) {
            headers.insert("x-forwarded-host", value);
        }
    }

    if !headers.contains_key("x-request-id") {
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert("x-request-id", value);
        }
    }
}
