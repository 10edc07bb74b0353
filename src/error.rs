//! Error types for turnstile.

use thiserror::Error;

/// Main error type for turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A limiter was asked to start from an unusable capacity, rate or interval
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;
