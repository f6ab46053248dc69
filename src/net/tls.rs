//! TLS termination.
//!
//! # Responsibilities
//! - Load certificates and private keys into a rustls `ServerConfig`
//! - Accept HTTPS connections, handshake, and serve the proxy router
//!
//! Backend traffic stays plain HTTP; TLS ends here.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::connect_info::ConnectInfo;
use axum::{body::Body, http::Request, Router};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::pki_types::CertificateDer;
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;

use crate::lifecycle::shutdown::DRAIN_GRACE;

/// Error type for TLS setup.
#[derive(Debug)]
pub enum TlsError {
    Io(std::io::Error),
    NoPrivateKey,
    Config(rustls::Error),
}

impl std::fmt::Display for TlsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsError::Io(e) => write!(f, "IO error reading TLS material: {}", e),
            TlsError::NoPrivateKey => write!(f, "no private key found in key file"),
            TlsError::Config(e) => write!(f, "TLS configuration rejected: {}", e),
        }
    }
}

impl std::error::Error for TlsError {}

impl From<std::io::Error> for TlsError {
    fn from(e: std::io::Error) -> Self {
        TlsError::Io(e)
    }
}

/// Load a rustls `ServerConfig` from PEM certificate and key paths.
pub fn load_tls_config<P: AsRef<Path>>(
    cert_path: P,
    key_path: P,
) -> Result<Arc<ServerConfig>, TlsError> {
    let cert_file = File::open(cert_path)?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()?;

    let key_file = File::open(key_path)?;
    let mut key_reader = BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or(TlsError::NoPrivateKey)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(TlsError::Config)?;

    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Accept loop for the HTTPS listener. Stops accepting when shutdown fires,
/// then drains connections still being served, up to the drain grace period.
pub async fn serve(
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    app: Router,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    let acceptor = TlsAcceptor::from(tls_config);
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTPS listener started");

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            // Reap finished connections so the set does not grow unbounded.
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                        continue;
                    }
                };
                let acceptor = acceptor.clone();
                let app = app.clone();
                connections.spawn(serve_connection(stream, peer, acceptor, app));
            }
        }
    }

    // Refuse new accepts, then wait for in-flight connections.
    drop(listener);
    if !connections.is_empty() {
        tracing::info!(
            address = %addr,
            in_flight = connections.len(),
            "Draining HTTPS connections"
        );
        let drain = async {
            while connections.join_next().await.is_some() {}
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            tracing::warn!(address = %addr, "HTTPS drain deadline exceeded, aborting connections");
            connections.abort_all();
        }
    }

    tracing::info!(address = %addr, "HTTPS listener stopped");
    Ok(())
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    app: Router,
) {
    let tls_stream = match acceptor.accept(stream).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
            return;
        }
    };

    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        // Same extension axum's make-service installs for ConnectInfo.
        request.extensions_mut().insert(ConnectInfo(peer));
        app.clone().oneshot(request.map(Body::new))
    });

    if let Err(e) = auto::Builder::new(TokioExecutor::new())
        .serve_connection_with_upgrades(TokioIo::new(tls_stream), service)
        .await
    {
        tracing::debug!(peer = %peer, error = %e, "Error serving TLS connection");
    }
}
