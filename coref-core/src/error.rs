//! Error types for coref-core.

use thiserror::Error;

/// Result type for coref-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for coref-core operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A span group key already holds spans and may not be overwritten.
    #[error("Span group key collision: {0}")]
    KeyCollision(String),

    /// A span lies outside the document or is empty.
    #[error("Span out of bounds: {0}")]
    SpanOutOfBounds(String),
}

impl Error {
    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a key collision error.
    #[must_use]
    pub fn key_collision(key: impl Into<String>) -> Self {
        Self::KeyCollision(key.into())
    }

    /// Create a span out of bounds error.
    #[must_use]
    pub fn span_out_of_bounds(msg: impl Into<String>) -> Self {
        Self::SpanOutOfBounds(msg.into())
    }
}
