//! Per-IP SMTP rate limiting.
//!
//! Each remote IP gets a bucket of `points` that replenishes as a whole
//! when the `duration` window rolls over, matching the retry-after
//! semantics SMTP clients expect from a `421 4.7.0` response. The limiter
//! is consulted at connect and again on every MAIL FROM.

use crate::config::RateLimitConfig;
use crate::error::{GatewayError, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// How often stale buckets are pruned.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Bucket {
    remaining: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    enabled: bool,
    points: u32,
    window: Duration,
    buckets: RwLock<HashMap<String, Bucket>>,
    last_cleanup: RwLock<Instant>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            points: config.points.max(1),
            window: Duration::from_secs(config.duration.max(1)),
            buckets: RwLock::new(HashMap::new()),
            last_cleanup: RwLock::new(Instant::now()),
        }
    }

    /// Consume one point for `ip`. On exhaustion the error carries the
    /// time until the window rolls over.
    pub async fn consume(&self, ip: &str) -> Result<()> {
        if self.enabled {
            self.maybe_cleanup().await;
        } else {
            return Ok(());
        }

        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let bucket = buckets.entry(ip.to_string()).or_insert_with(|| Bucket {
            remaining: self.points,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.remaining = self.points;
            bucket.window_start = now;
        }

        if bucket.remaining == 0 {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after_ms = self
                .window
                .saturating_sub(elapsed)
                .as_millis()
                .max(1) as u64;
            warn!(ip, retry_after_ms, "rate limit exceeded");
            return Err(GatewayError::RateLimitExceeded { retry_after_ms });
        }

        bucket.remaining -= 1;
        Ok(())
    }

    /// Forget any bucket for `ip`, restoring its full allowance.
    pub async fn reset(&self, ip: &str) {
        if !self.enabled {
            return;
        }
        let mut buckets = self.buckets.write().await;
        buckets.remove(ip);
        debug!(ip, "rate limit reset");
    }

    async fn maybe_cleanup(&self) {
        let now = Instant::now();
        {
            let last = self.last_cleanup.read().await;
            if now.duration_since(*last) < CLEANUP_INTERVAL {
                return;
            }
        }
        let mut last = self.last_cleanup.write().await;
        if now.duration_since(*last) < CLEANUP_INTERVAL {
            return;
        }
        *last = now;
        drop(last);

        let mut buckets = self.buckets.write().await;
        let window = self.window;
        let before = buckets.len();
        buckets.retain(|_, b| now.duration_since(b.window_start) < window * 2);
        debug!(pruned = before - buckets.len(), "rate limiter cleanup");
    }

    #[cfg(test)]
    async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enabled: bool, points: u32, duration: u64) -> RateLimitConfig {
        RateLimitConfig {
            enabled,
            points,
            duration,
        }
    }

    #[tokio::test]
    async fn test_allows_up_to_points() {
        let limiter = RateLimiter::new(&config(true, 5, 60));

        for _ in 0..5 {
            assert!(limiter.consume("192.0.2.1").await.is_ok());
        }

        let err = limiter.consume("192.0.2.1").await.unwrap_err();
        match err {
            GatewayError::RateLimitExceeded { retry_after_ms } => {
                // The window just opened, so the wait is close to a minute.
                assert!(retry_after_ms > 55_000 && retry_after_ms <= 60_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ips_are_independent() {
        let limiter = RateLimiter::new(&config(true, 1, 60));
        assert!(limiter.consume("192.0.2.1").await.is_ok());
        assert!(limiter.consume("192.0.2.2").await.is_ok());
        assert!(limiter.consume("192.0.2.1").await.is_err());
    }

    #[tokio::test]
    async fn test_reset_restores_allowance() {
        let limiter = RateLimiter::new(&config(true, 1, 60));
        assert!(limiter.consume("192.0.2.1").await.is_ok());
        assert!(limiter.consume("192.0.2.1").await.is_err());

        limiter.reset("192.0.2.1").await;
        assert!(limiter.consume("192.0.2.1").await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_always_allows() {
        let limiter = RateLimiter::new(&config(false, 1, 60));
        for _ in 0..100 {
            assert!(limiter.consume("192.0.2.1").await.is_ok());
        }
        assert_eq!(limiter.bucket_count().await, 0);
    }

    #[tokio::test]
    async fn test_window_rollover_replenishes() {
        let limiter = RateLimiter::new(&config(true, 1, 1));
        assert!(limiter.consume("192.0.2.1").await.is_ok());
        assert!(limiter.consume("192.0.2.1").await.is_err());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.consume("192.0.2.1").await.is_ok());
    }
}
