//! Turnstile - token bucket admission control
//!
//! This crate implements a thread-safe token bucket that answers one question
//! under concurrent load: may this unit of work proceed right now? Buckets
//! refill lazily from an injectable clock, and a keyed registry lets many
//! independently configured buckets live side by side in one process.

pub mod config;
pub mod error;
pub mod ratelimit;
pub mod workload;
