//! Common error types for DisputeHub

use thiserror::Error;

/// Common result type for DisputeHub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across DisputeHub services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Policy denial with a human-readable reason (round cap, capacity, rate limit)
    #[error("Limit reached: {0}")]
    LimitReached(String),

    /// Upstream service error (LLM, Stripe, email provider)
    #[error("External service error: {0}")]
    External(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
