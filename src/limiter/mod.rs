//! Sliding-window rate limiting for the handshake-initiation endpoint.
//!
//! The limiter is keyed by client-reported IP, which is spoofable: it is a
//! coarse abuse deterrent, not a security boundary. When no limiter backend
//! is configured the gate is bypassed entirely (fail-open) so the limiter
//! never becomes a hard dependency of login. Backend errors also fail open,
//! with a warning, for the same reason.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;
use ulid::Ulid;

/// Reference configuration: 10 requests per 60 seconds per key.
pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn allow(&self, key: &str) -> RateLimitDecision;
}

/// Limiter used when no backend is configured. Always allows.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn allow(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Sliding window over a Redis sorted set, shared across instances.
///
/// One atomic pipeline per check: trim entries older than the window, add the
/// current request, count, and refresh the key expiry.
#[derive(Clone)]
pub struct RedisSlidingWindow {
    connection: ConnectionManager,
    limit: u32,
    window: Duration,
}

impl RedisSlidingWindow {
    /// Connect to the limiter backend.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the connection fails.
    pub async fn connect(url: &str, limit: u32, window: Duration) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self {
            connection,
            limit,
            window,
        })
    }

    async fn count(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut connection = self.connection.clone();
        let key = format!("ratelimit:{key}");
        let now_ms = i64::try_from(
            std::time::SystemTime::now()
                .duration_since(std::time::SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        )
        .unwrap_or(i64::MAX);
        let window_ms = i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_ms.saturating_sub(window_ms);
        // Members must be unique per request; score carries the timestamp.
        let member = format!("{now_ms}:{}", Ulid::new());

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("ZREMRANGEBYSCORE")
            .arg(&key)
            .arg("-inf")
            .arg(cutoff)
            .ignore()
            .zadd(&key, member, now_ms)
            .ignore()
            .zcard(&key)
            .expire(&key, i64::try_from(self.window.as_secs()).unwrap_or(60))
            .ignore()
            .query_async(&mut connection)
            .await?;

        Ok(count)
    }
}

#[async_trait]
impl RateLimiter for RedisSlidingWindow {
    async fn allow(&self, key: &str) -> RateLimitDecision {
        match self.count(key).await {
            Ok(count) if count <= i64::from(self.limit) => RateLimitDecision::Allowed,
            Ok(_) => RateLimitDecision::Limited,
            Err(err) => {
                // Fail open: a downed limiter backend must not block login.
                warn!("rate limiter backend unavailable, allowing request: {err}");
                RateLimitDecision::Allowed
            }
        }
    }
}

/// In-process sliding window with the same semantics as the Redis variant.
/// Used by tests and single-instance deployments.
pub struct MemorySlidingWindow {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
    limit: u32,
    window: Duration,
}

impl MemorySlidingWindow {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }
}

#[async_trait]
impl RateLimiter for MemorySlidingWindow {
    async fn allow(&self, key: &str) -> RateLimitDecision {
        let Ok(mut windows) = self.windows.lock() else {
            warn!("rate limiter state poisoned, allowing request");
            return RateLimitDecision::Allowed;
        };
        let now = Instant::now();
        let hits = windows.entry(key.to_string()).or_default();
        while hits
            .front()
            .is_some_and(|first| now.duration_since(*first) >= self.window)
        {
            hits.pop_front();
        }
        hits.push_back(now);
        if hits.len() <= self.limit as usize {
            RateLimitDecision::Allowed
        } else {
            RateLimitDecision::Limited
        }
    }
}
