//! Per-key limiter registry.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use super::clock::{Clock, SystemClock};
use super::rules::{Limits, RateLimitConfig};
use crate::error::Result;

/// A set of independent token buckets, one per client key.
///
/// Buckets are created on first use, from the key's override rule if it has
/// one and from the default rule otherwise. All rules are validated up front,
/// so creating a bucket later cannot fail.
///
/// This struct is thread-safe and can be shared across multiple tasks.
#[derive(Debug)]
pub struct KeyedLimiter<C: Clock + Clone = SystemClock> {
    /// Buckets indexed by client key
    buckets: DashMap<String, Arc<TokenBucket<C>>>,
    /// Limits for keys without an override
    default_limits: Limits,
    /// Limits for specific keys
    overrides: HashMap<String, Limits>,
    clock: C,
}

impl KeyedLimiter<SystemClock> {
    /// Create a keyed limiter that reads the system clock.
    pub fn new(config: &RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock + Clone> KeyedLimiter<C> {
    /// Create a keyed limiter whose buckets all read the given clock.
    pub fn with_clock(config: &RateLimitConfig, clock: C) -> Result<Self> {
        let (default_limits, overrides) = config.resolve()?;

        Ok(Self {
            buckets: DashMap::new(),
            default_limits,
            overrides,
            clock,
        })
    }

    /// Get the bucket for a key, creating it if necessary.
    pub fn bucket(&self, key: &str) -> Arc<TokenBucket<C>> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }

        let entry = self.buckets.entry(key.to_string()).or_insert_with(|| {
            let limits = self.limits_for(key);
            debug!(
                key = %key,
                capacity = limits.capacity(),
                refill_rate = limits.refill_rate(),
                refill_interval = ?limits.refill_interval(),
                "Creating token bucket"
            );
            Arc::new(TokenBucket::from_limits(limits, self.clock.clone()))
        });
        Arc::clone(entry.value())
    }

    /// Try to take one token from the key's bucket.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_many(key, 1)
    }

    /// Try to take `hits` tokens from the key's bucket, all or nothing.
    pub fn try_acquire_many(&self, key: &str, hits: u64) -> bool {
        // The map shard lock is released before the bucket is touched.
        let bucket = self.bucket(key);
        let admitted = bucket.try_acquire_many(hits);

        trace!(key = %key, hits = hits, admitted = admitted, "Keyed admission check");
        admitted
    }

    /// Tokens left in the key's bucket, or `None` if the key has not been seen.
    pub fn tokens(&self, key: &str) -> Option<u64> {
        self.buckets.get(key).map(|bucket| bucket.tokens())
    }

    /// The limits a bucket for this key is (or would be) created with.
    pub fn limits_for(&self, key: &str) -> Limits {
        self.overrides
            .get(key)
            .copied()
            .unwrap_or(self.default_limits)
    }

    /// Number of buckets created so far.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop every bucket. Keys seen again start from a full bucket.
    pub fn clear(&self) {
        self.buckets.clear();
    }
}
