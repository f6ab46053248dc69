//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use load_balancer::config::{BalancerConfig, ServerConfig};
use load_balancer::health::HealthProber;
use load_balancer::http::HttpServer;
use load_balancer::lifecycle::Shutdown;
use load_balancer::pool::{Algorithm, ServerPool};

/// Start a mock backend that returns 200 with a fixed body.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move |_head| async move { (200, body.to_string()) }).await
}

/// Start a programmable mock backend bound to an ephemeral port. The
/// closure receives the raw request head (start line plus headers) and
/// returns the status and body to send back.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 8192];
                        let mut head = Vec::new();
                        loop {
                            match socket.read(&mut buf).await {
                                Ok(0) => return,
                                Ok(n) => {
                                    head.extend_from_slice(&buf[..n]);
                                    if head.windows(4).any(|w| w == b"\r\n\r\n") {
                                        break;
                                    }
                                }
                                Err(_) => return,
                            }
                        }

                        let (status, body) = f(String::from_utf8_lossy(&head).to_string()).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Reserve a port that nothing listens on (connections get refused).
pub async fn dead_backend_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn server_entry(addr: SocketAddr, weight: u32) -> ServerConfig {
    ServerConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        weight,
    }
}

/// A running balancer plus handles for test assertions.
pub struct TestBalancer {
    pub addr: SocketAddr,
    pub pool: Arc<ServerPool>,
    pub prober: Arc<HealthProber>,
    pub shutdown: Shutdown,
    pub requests_handled: Arc<AtomicU64>,
}

impl TestBalancer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Spawn the balancer on an ephemeral port with the given configuration.
pub async fn spawn_balancer(config: BalancerConfig) -> TestBalancer {
    let config = Arc::new(config);
    let algorithm = Algorithm::parse_or_default(&config.load_balancing_algorithm);
    let pool = Arc::new(ServerPool::new(&config.servers, algorithm));
    let requests_handled = Arc::new(AtomicU64::new(0));

    let prober = Arc::new(HealthProber::new(pool.clone(), config.health_check.clone()));
    if config.health_check.enabled {
        prober.start();
    }

    let shutdown = Shutdown::new();
    let server = Arc::new(HttpServer::new(
        config,
        pool.clone(),
        requests_handled.clone(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestBalancer {
        addr,
        pool,
        prober,
        shutdown,
        requests_handled,
    }
}

/// HTTP client without connection reuse, so every request dials fresh.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
