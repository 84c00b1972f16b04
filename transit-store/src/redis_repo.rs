use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns whether the caller is still within `limit`.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = window_pipeline(key, window_seconds)
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// `INCR` plus an expiry set only by the first hit of a window (Redis 7+ `NX`),
/// so later hits never push the reset further out.
fn window_pipeline(key: &str, window_seconds: i64) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .incr(key, 1)
        .cmd("EXPIRE")
        .arg(key)
        .arg(window_seconds)
        .arg("NX")
        .ignore();
    pipe
}

pub fn rate_limit_key(client: &str) -> String {
    format!("ratelimit:{}", client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(rate_limit_key("10.0.0.1"), "ratelimit:10.0.0.1");
    }

    #[test]
    fn test_expiry_only_set_once_per_window() {
        let packed = window_pipeline("ratelimit:10.0.0.1", 60).get_packed_pipeline();
        let text = String::from_utf8_lossy(&packed);

        assert!(text.contains("INCR"));
        assert!(text.contains("EXPIRE"));
        assert!(text.contains("\r\nNX\r\n"));
        assert!(text.contains("\r\n60\r\n"));
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(RedisClient::new("not-a-redis-url").is_err());
    }
}
