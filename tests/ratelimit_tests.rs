//! 全局与按客户端限流的组合行为

use std::sync::Arc;
use std::time::Duration;

use snaplink::cache::{KvBackend, MemoryKvBackend};
use snaplink::config::RateLimitConfig;
use snaplink::ratelimit::{FixedWindowLimiter, RateLimitDecision, RateLimiters, SlidingWindowLimiter};

const OP_TIMEOUT: Duration = Duration::from_millis(200);

fn limiters(kv: Arc<dyn KvBackend>, global: u64, per_client: u64, window: Duration) -> RateLimiters {
    RateLimiters::new(
        Some(FixedWindowLimiter::new(
            Arc::clone(&kv),
            "global",
            global,
            window,
            OP_TIMEOUT,
        )),
        Some(SlidingWindowLimiter::new(kv, per_client, window, OP_TIMEOUT)),
    )
}

#[tokio::test]
async fn test_global_limit_across_clients() {
    let kv: Arc<dyn KvBackend> = Arc::new(MemoryKvBackend::new());
    let limiters = limiters(kv, 4, 100, Duration::from_millis(400));

    for i in 0..4 {
        assert!(limiters.check(&format!("10.0.0.{}", i)).await.is_allowed());
    }
    match limiters.check("10.0.0.99").await {
        RateLimitDecision::Rejected { retry_after } => {
            assert!(retry_after.unwrap() <= Duration::from_millis(400));
        }
        other => panic!("expected rejection, got {:?}", other),
    }

    // 窗口过期后开启新窗口
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(limiters.check("10.0.0.99").await.is_allowed());
}

#[tokio::test]
async fn test_per_client_limit_is_isolated() {
    let kv: Arc<dyn KvBackend> = Arc::new(MemoryKvBackend::new());
    let limiters = limiters(kv, 1_000, 3, Duration::from_secs(60));

    for _ in 0..3 {
        assert!(limiters.check("198.51.100.7").await.is_allowed());
    }
    assert!(!limiters.check("198.51.100.7").await.is_allowed());

    for _ in 0..3 {
        assert!(limiters.check("198.51.100.8").await.is_allowed());
    }
}

#[tokio::test]
async fn test_concurrent_requests_respect_global_limit() {
    let kv: Arc<dyn KvBackend> = Arc::new(MemoryKvBackend::new());
    let limiters = Arc::new(limiters(kv, 10, 1_000, Duration::from_secs(60)));

    let mut handles = Vec::new();
    for i in 0..40 {
        let limiters = Arc::clone(&limiters);
        handles.push(tokio::spawn(async move {
            limiters.check(&format!("client-{}", i)).await.is_allowed()
        }));
    }

    let mut allowed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 10);
}

#[tokio::test]
async fn test_from_config_uses_configured_limits() {
    let config = RateLimitConfig {
        enabled: true,
        global_limit: 100,
        global_window_secs: 60,
        per_client_limit: 2,
        per_client_window_secs: 60,
    };
    let limiters = RateLimiters::from_config(&config, Arc::new(MemoryKvBackend::new()), OP_TIMEOUT);

    assert!(limiters.is_enabled());
    assert!(limiters.check("203.0.113.1").await.is_allowed());
    assert!(limiters.check("203.0.113.1").await.is_allowed());
    assert!(!limiters.check("203.0.113.1").await.is_allowed());
}
