//! Fixed-window request counting, in Redis when available and in process otherwise.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    redis: Option<ConnectionManager>,
    local: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_redis(redis: Option<ConnectionManager>) -> Self {
        Self {
            redis,
            local: Arc::default(),
        }
    }

    /// Count one request for `key` and fail once more than `limit` arrived
    /// within the current `window`.
    pub async fn hit(&self, key: &str, limit: u32, window: Duration) -> GatewayResult<()> {
        let count = match self.redis.clone() {
            Some(mut conn) => match Self::redis_hit(&mut conn, key, window).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(key, error = %err, "redis rate limit check failed, counting in process");
                    self.local_hit(key, window, Instant::now())?
                }
            },
            None => self.local_hit(key, window, Instant::now())?,
        };

        if count > limit {
            warn!(key, count, limit, "rate limit exceeded");
            return Err(GatewayError::RateLimitExceeded);
        }
        Ok(())
    }

    async fn redis_hit(conn: &mut ConnectionManager, key: &str, window: Duration) -> redis::RedisResult<u32> {
        let redis_key = format!("ratelimit:{key}");
        let count: u32 = conn.incr(&redis_key, 1).await?;
        if count == 1 {
            let seconds = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
            let _: () = conn.expire(&redis_key, seconds).await?;
        }
        Ok(count)
    }

    fn local_hit(&self, key: &str, window: Duration, now: Instant) -> GatewayResult<u32> {
        let mut windows = self
            .local
            .lock()
            .map_err(|_| GatewayError::InternalError("rate limiter state poisoned".to_string()))?;

        windows.retain(|_, w| now.duration_since(w.started) < window);
        let entry = windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        entry.count += 1;
        Ok(entry.count)
    }
}
