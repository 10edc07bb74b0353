//! Token bucket implementation.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::rules::Limits;
use crate::error::Result;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A thread-safe token bucket.
///
/// The bucket starts full and refills lazily: nothing happens between calls,
/// and each call first credits whatever whole refill intervals have passed since
/// the last credit. Only whole intervals are credited; the leftover fraction is
/// kept for the next call, so bursty callers are not under-credited.
///
/// ```
/// use std::time::Duration;
/// use turnstile::ratelimit::TokenBucket;
///
/// let bucket = TokenBucket::new(5, 2, Duration::from_secs(1)).unwrap();
/// for _ in 0..5 {
///     assert!(bucket.try_acquire());
/// }
/// assert!(!bucket.try_acquire());
/// ```
#[derive(Debug)]
pub struct TokenBucket<C: Clock = SystemClock> {
    limits: Limits,
    clock: C,
    state: Mutex<BucketState>,
}

/// Token count and refill timestamp, always updated together.
#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

impl BucketState {
    /// Credit every whole refill interval between `last_refill` and `now`.
    fn refill(&mut self, limits: &Limits, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let interval = limits.refill_interval();
        if elapsed < interval {
            return;
        }

        let interval_nanos = interval.as_nanos();
        let ticks = elapsed.as_nanos() / interval_nanos;
        let granted = ticks.saturating_mul(u128::from(limits.refill_rate()));
        let capacity = u128::from(limits.capacity());

        // Bounded by capacity, which came from a u64.
        self.tokens = u128::from(self.tokens).saturating_add(granted).min(capacity) as u64;
        self.last_refill += duration_from_nanos(ticks * interval_nanos);
    }
}

/// `ticks * interval` never exceeds an elapsed `Duration`, so it fits back into one.
fn duration_from_nanos(nanos: u128) -> Duration {
    Duration::new(
        (nanos / NANOS_PER_SEC) as u64,
        (nanos % NANOS_PER_SEC) as u32,
    )
}

impl TokenBucket<SystemClock> {
    /// Create a bucket that reads the system clock.
    ///
    /// Fails if `capacity`, `refill_rate` or `refill_interval` is zero.
    pub fn new(capacity: u64, refill_rate: u64, refill_interval: Duration) -> Result<Self> {
        Self::with_clock(capacity, refill_rate, refill_interval, SystemClock::new())
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a bucket that reads the given clock.
    pub fn with_clock(
        capacity: u64,
        refill_rate: u64,
        refill_interval: Duration,
        clock: C,
    ) -> Result<Self> {
        let limits = Limits::new(capacity, refill_rate, refill_interval)?;
        Ok(Self::from_limits(limits, clock))
    }

    /// Create a full bucket from already validated limits.
    pub fn from_limits(limits: Limits, clock: C) -> Self {
        let state = BucketState {
            tokens: limits.capacity(),
            last_refill: clock.now(),
        };

        Self {
            limits,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Try to take one token.
    ///
    /// Returns `true` if the caller may proceed. Never blocks waiting for
    /// capacity; a denied caller decides for itself whether to reject, queue
    /// or retry.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_many(1)
    }

    /// Try to take `hits` tokens at once.
    ///
    /// Either all of them are taken or none are. Zero hits are always admitted
    /// and consume nothing; more hits than the capacity are never admitted.
    pub fn try_acquire_many(&self, hits: u64) -> bool {
        let now = self.clock.now();

        let (admitted, remaining) = {
            let mut state = self.state.lock();
            state.refill(&self.limits, now);

            let admitted = state.tokens >= hits;
            if admitted {
                state.tokens -= hits;
            }
            (admitted, state.tokens)
        };

        if admitted {
            trace!(hits = hits, remaining = remaining, "Tokens acquired");
        } else {
            debug!(
                hits = hits,
                remaining = remaining,
                capacity = self.limits.capacity(),
                "Token bucket exhausted"
            );
        }

        admitted
    }

    /// Tokens available as of the last refill, without crediting elapsed time.
    pub fn tokens(&self) -> u64 {
        self.state.lock().tokens
    }

    /// How long until a token could be available.
    ///
    /// Zero when a token is available now. Otherwise the time left until the
    /// next refill tick completes.
    pub fn time_until_refill(&self) -> Duration {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.refill(&self.limits, now);

        if state.tokens > 0 {
            return Duration::ZERO;
        }

        let elapsed = now.saturating_duration_since(state.last_refill);
        self.limits.refill_interval().saturating_sub(elapsed)
    }

    /// The validated parameters of this bucket.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Maximum number of tokens.
    pub fn capacity(&self) -> u64 {
        self.limits.capacity()
    }

    /// Tokens granted per refill interval.
    pub fn refill_rate(&self) -> u64 {
        self.limits.refill_rate()
    }

    /// Length of one refill tick.
    pub fn refill_interval(&self) -> Duration {
        self.limits.refill_interval()
    }
}
