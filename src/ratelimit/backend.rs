//! Admission trait for abstracting over limiter implementations.

use super::bucket::TokenBucket;
use super::clock::Clock;
use super::keyed::KeyedLimiter;

/// Trait for admission control implementations.
///
/// This trait abstracts over a single shared [`TokenBucket`] and a
/// [`KeyedLimiter`] so callers such as the workload driver can work with
/// either. A backend that coordinates across processes would implement it too.
pub trait AdmissionControl: Send + Sync {
    /// Decide whether `hits` units of work for `key` may proceed now.
    fn try_admit(&self, key: &str, hits: u64) -> bool;
}

/// Every key draws from the one shared pool.
impl<C: Clock> AdmissionControl for TokenBucket<C> {
    fn try_admit(&self, _key: &str, hits: u64) -> bool {
        self.try_acquire_many(hits)
    }
}

impl<C: Clock + Clone> AdmissionControl for KeyedLimiter<C> {
    fn try_admit(&self, key: &str, hits: u64) -> bool {
        self.try_acquire_many(key, hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::rules::{LimitRule, RateLimitConfig};
    use crate::ratelimit::MockClock;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[test]
    fn test_bucket_ignores_key() {
        let clock = MockClock::new(Instant::now());
        let bucket = TokenBucket::with_clock(2, 1, Duration::from_secs(1), clock).unwrap();
        let admission: Arc<dyn AdmissionControl> = Arc::new(bucket);

        assert!(admission.try_admit("a", 1));
        assert!(admission.try_admit("b", 1));
        assert!(!admission.try_admit("c", 1));
    }

    #[test]
    fn test_keyed_limiter_separates_keys() {
        let clock = MockClock::new(Instant::now());
        let config = RateLimitConfig::new(LimitRule {
            capacity: 1,
            refill_rate: 1,
            refill_interval_ms: 1000,
            name: None,
        });
        let limiter = KeyedLimiter::with_clock(&config, clock).unwrap();
        let admission: Arc<dyn AdmissionControl> = Arc::new(limiter);

        assert!(admission.try_admit("a", 1));
        assert!(!admission.try_admit("a", 1));
        assert!(admission.try_admit("b", 1));
    }
}
