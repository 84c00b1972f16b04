//! Runs against a real Redis (7+) when `TEST_REDIS_URL` is set; skipped otherwise.

use std::time::Duration;
use transit_store::redis_repo::rate_limit_key;
use transit_store::RedisClient;
use uuid::Uuid;

fn connect() -> Option<(RedisClient, redis::Client)> {
    let url = std::env::var("TEST_REDIS_URL").ok()?;
    let limiter = RedisClient::new(&url).ok()?;
    let raw = redis::Client::open(url.as_str()).ok()?;
    Some((limiter, raw))
}

#[tokio::test]
async fn test_window_resets_under_steady_traffic() {
    let Some((limiter, raw)) = connect() else {
        return;
    };
    let key = rate_limit_key(&format!("test-{}", Uuid::new_v4()));
    let mut conn = raw.get_multiplexed_async_connection().await.unwrap();

    assert!(limiter.check_rate_limit(&key, 2, 2).await.unwrap());
    tokio::time::sleep(Duration::from_millis(1200)).await;

    // A later hit must not extend the window
    assert!(limiter.check_rate_limit(&key, 2, 2).await.unwrap());
    let ttl_ms: i64 = redis::cmd("PTTL").arg(&key).query_async(&mut conn).await.unwrap();
    assert!(ttl_ms > 0 && ttl_ms <= 1000, "ttl was {}", ttl_ms);

    assert!(!limiter.check_rate_limit(&key, 2, 2).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(limiter.check_rate_limit(&key, 2, 2).await.unwrap());
    let count: i64 = redis::cmd("GET").arg(&key).query_async(&mut conn).await.unwrap();
    assert_eq!(count, 1);
}
