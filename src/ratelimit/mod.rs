//! Token bucket rate limiting and admission control.

mod backend;
mod bucket;
mod clock;
mod keyed;
mod rules;

pub use backend::AdmissionControl;
pub use bucket::TokenBucket;
pub use clock::{Clock, MockClock, SystemClock};
pub use keyed::KeyedLimiter;
pub use rules::{LimitRule, Limits, RateLimitConfig};
