//! Token bucket rate limiter keyed by login email.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    max_tokens: u32,
    refill_rate: f64, // tokens per second
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            max_tokens: requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }

    /// Take one token for `key`. False when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());

        let bucket = buckets.entry(key.to_lowercase()).or_insert(TokenBucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets that have refilled completely.
    pub fn prune(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let max = self.max_tokens as f64;
        let rate = self.refill_rate;
        buckets.retain(|_, b| {
            b.tokens + now.saturating_duration_since(b.last_refill).as_secs_f64() * rate < max
        });
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exhausts_then_refills() {
        let limiter = RateLimiter::new(3);
        let start = Instant::now();

        assert!(limiter.check_at("a@example.com", start));
        assert!(limiter.check_at("a@example.com", start));
        assert!(limiter.check_at("a@example.com", start));
        assert!(!limiter.check_at("a@example.com", start));

        // 3 per minute refills one token every 20 seconds.
        assert!(limiter.check_at("a@example.com", start + Duration::from_secs(21)));
    }

    #[test]
    fn test_keys_are_independent_and_case_insensitive() {
        let limiter = RateLimiter::new(1);
        let now = Instant::now();

        assert!(limiter.check_at("A@example.com", now));
        assert!(!limiter.check_at("a@EXAMPLE.com", now));
        assert!(limiter.check_at("b@example.com", now));
    }

    #[test]
    fn test_prune_keeps_drained_buckets() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a@example.com"));
        limiter.prune();
        assert_eq!(limiter.tracked(), 1);
    }
}
