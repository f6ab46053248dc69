//! Integration tests for the active health prober.
//!
//! Sweeps are driven directly for determinism; the timer itself is
//! exercised by the eviction test at a short interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use load_balancer::config::BalancerConfig;

mod common;

/// Health checks configured but not started: tests call `sweep` directly.
fn probing_config() -> BalancerConfig {
    let mut config = BalancerConfig::default();
    config.health_check.enabled = false;
    config.health_check.interval_ms = 60_000;
    config.health_check.timeout_ms = 1_000;
    config
}

/// A backend serving "/health" per the given flag and "body" otherwise.
async fn backend_with_health_flag(
    healthy: Arc<AtomicBool>,
    body: &'static str,
) -> std::net::SocketAddr {
    common::start_programmable_backend(move |head| {
        let healthy = healthy.clone();
        async move {
            if head.starts_with("GET /health") {
                if healthy.load(Ordering::SeqCst) {
                    (200, "ok".to_string())
                } else {
                    (500, "failing".to_string())
                }
            } else {
                (200, body.to_string())
            }
        }
    })
    .await
}

#[tokio::test]
async fn test_sweep_marks_failing_backend_unhealthy() {
    let a = backend_with_health_flag(Arc::new(AtomicBool::new(true)), "a").await;
    let b = backend_with_health_flag(Arc::new(AtomicBool::new(false)), "b").await;

    let mut config = probing_config();
    config.load_balancing_algorithm = "ROUND_ROBIN".into();
    config.servers = vec![common::server_entry(a, 1), common::server_entry(b, 1)];

    let balancer = common::spawn_balancer(config).await;
    balancer.prober.sweep().await;

    let b_id = format!("{}:{}", b.ip(), b.port());
    assert!(!balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    // All traffic lands on the surviving backend.
    let client = common::client();
    for _ in 0..10 {
        let response = client.get(balancer.url("/")).send().await.unwrap();
        assert_eq!(response.text().await.unwrap(), "a");
    }

    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_sweep_restores_recovered_backend() {
    let b_healthy = Arc::new(AtomicBool::new(false));
    let a = backend_with_health_flag(Arc::new(AtomicBool::new(true)), "a").await;
    let b = backend_with_health_flag(b_healthy.clone(), "b").await;

    let mut config = probing_config();
    config.servers = vec![common::server_entry(a, 1), common::server_entry(b, 1)];

    let balancer = common::spawn_balancer(config).await;
    let b_id = format!("{}:{}", b.ip(), b.port());

    balancer.prober.sweep().await;
    assert!(!balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    b_healthy.store(true, Ordering::SeqCst);
    balancer.prober.sweep().await;
    assert!(balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_expected_body_substring_enforced() {
    let good = common::start_programmable_backend(|_| async { (200, "status: ok".to_string()) })
        .await;
    let bad =
        common::start_programmable_backend(|_| async { (200, "status: degraded".to_string()) })
            .await;

    let mut config = probing_config();
    config.health_check.expect_body = Some("ok".to_string());
    config.servers = vec![common::server_entry(good, 1), common::server_entry(bad, 1)];

    let balancer = common::spawn_balancer(config).await;
    balancer.prober.sweep().await;

    let good_id = format!("{}:{}", good.ip(), good.port());
    let bad_id = format!("{}:{}", bad.ip(), bad.port());
    assert!(balancer.pool.get_by_id(&good_id).unwrap().is_healthy());
    assert!(!balancer.pool.get_by_id(&bad_id).unwrap().is_healthy());

    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_probe_timeout_marks_unhealthy() {
    let slow = common::start_programmable_backend(|_| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "late".to_string())
    })
    .await;

    let mut config = probing_config();
    config.health_check.timeout_ms = 100;
    config.servers = vec![common::server_entry(slow, 1)];

    let balancer = common::spawn_balancer(config).await;
    balancer.prober.sweep().await;

    let slow_id = format!("{}:{}", slow.ip(), slow.port());
    assert!(!balancer.pool.get_by_id(&slow_id).unwrap().is_healthy());

    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_connection_refused_marks_unhealthy() {
    let dead = common::dead_backend_addr().await;

    let mut config = probing_config();
    config.servers = vec![common::server_entry(dead, 1)];

    let balancer = common::spawn_balancer(config).await;
    balancer.prober.sweep().await;

    let dead_id = format!("{}:{}", dead.ip(), dead.port());
    assert!(!balancer.pool.get_by_id(&dead_id).unwrap().is_healthy());

    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_periodic_sweeps_evict_and_restore() {
    let b_healthy = Arc::new(AtomicBool::new(true));
    let b = backend_with_health_flag(b_healthy.clone(), "b").await;

    let mut config = probing_config();
    config.health_check.enabled = true;
    config.health_check.interval_ms = 100;
    config.servers = vec![common::server_entry(b, 1)];

    let balancer = common::spawn_balancer(config).await;
    let b_id = format!("{}:{}", b.ip(), b.port());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    b_healthy.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    b_healthy.store(true, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(balancer.pool.get_by_id(&b_id).unwrap().is_healthy());

    balancer.prober.stop();
    balancer.shutdown.trigger();
}

#[tokio::test]
async fn test_start_is_idempotent_and_stop_cancels() {
    let a = common::start_mock_backend("a").await;

    let mut config = probing_config();
    config.health_check.interval_ms = 50;
    config.servers = vec![common::server_entry(a, 1)];

    let balancer = common::spawn_balancer(config).await;

    // Restarting while running clears the previous timer.
    balancer.prober.start();
    balancer.prober.start();
    tokio::time::sleep(Duration::from_millis(150)).await;

    balancer.prober.stop();
    balancer.prober.stop();

    balancer.shutdown.trigger();
}
