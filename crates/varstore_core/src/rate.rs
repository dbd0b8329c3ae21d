//! Token bucket pacing for bulk writes.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// A token bucket rate limiter.
///
/// Tokens refill continuously at `rate_per_second` up to `burst`. Each
/// [`RateLimiter::acquire`] takes one token, sleeping until it is
/// available. Callers that overdraw are scheduled behind each other, so
/// concurrent callers share the rate.
#[derive(Debug)]
pub struct RateLimiter {
    rate: Option<f64>,
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled: Instant,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate_per_second` acquisitions per second
    /// with bursts of up to `burst`.
    ///
    /// A zero rate is treated as unlimited and a zero burst as one.
    pub fn new(rate_per_second: u32, burst: u32) -> Self {
        if rate_per_second == 0 {
            return Self::unlimited();
        }
        let burst = f64::from(burst.max(1));
        Self {
            rate: Some(f64::from(rate_per_second)),
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                refilled: Instant::now(),
            }),
        }
    }

    /// Creates a limiter that never waits.
    pub fn unlimited() -> Self {
        Self {
            rate: None,
            burst: 1.0,
            bucket: Mutex::new(Bucket {
                tokens: 1.0,
                refilled: Instant::now(),
            }),
        }
    }

    /// Creates a limiter from an optional rate.
    pub fn from_rate(rate_per_second: Option<u32>, burst: u32) -> Self {
        rate_per_second.map_or_else(Self::unlimited, |rate| Self::new(rate, burst))
    }

    /// Returns true if this limiter never waits.
    pub fn is_unlimited(&self) -> bool {
        self.rate.is_none()
    }

    /// Estimates how long `count` acquisitions take from an empty bucket.
    pub fn estimate(&self, count: usize) -> Option<Duration> {
        self.rate
            .map(|rate| Duration::from_secs_f64(count as f64 / rate))
    }

    /// Takes one token, waiting for it if necessary.
    pub async fn acquire(&self) {
        let Some(rate) = self.rate else {
            return;
        };

        let wait = {
            let mut bucket = self.bucket.lock();
            let now = Instant::now();
            let elapsed = now.duration_since(bucket.refilled).as_secs_f64();
            bucket.tokens = (bucket.tokens + elapsed * rate).min(self.burst);
            bucket.refilled = now;
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                Duration::ZERO
            } else {
                Duration::from_secs_f64(-bucket.tokens / rate)
            }
        };

        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..10_000 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
        assert!(limiter.is_unlimited());
        assert_eq!(limiter.estimate(10), None);
    }

    #[tokio::test]
    async fn paces_to_rate() {
        let limiter = RateLimiter::new(100, 1);
        let start = Instant::now();
        for _ in 0..6 {
            limiter.acquire().await;
        }
        // One token up front, then five refills at 10ms each.
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[tokio::test]
    async fn burst_is_free() {
        let limiter = RateLimiter::new(1, 5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn zero_rate_is_unlimited() {
        assert!(RateLimiter::new(0, 1).is_unlimited());
        assert!(RateLimiter::from_rate(None, 1).is_unlimited());
        assert!(!RateLimiter::from_rate(Some(50), 1).is_unlimited());
    }

    #[test]
    fn estimate_scales_with_count() {
        let limiter = RateLimiter::new(50, 1);
        assert_eq!(limiter.estimate(100), Some(Duration::from_secs(2)));
    }
}
