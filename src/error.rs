//! Error types for coref.

use thiserror::Error;

/// Result type for coref operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for coref operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A caller or component broke its contract (bad batch size, key
    /// collision, malformed gold annotations, out-of-range antecedent index).
    #[error("{component}: contract violation: {message}")]
    ContractViolation {
        /// Component that detected the violation.
        component: String,
        /// What went wrong.
        message: String,
    },

    /// Invalid input provided (typically a shape mismatch).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not supported by this component.
    #[error("{component}.{method} is not supported")]
    NotSupported {
        /// Component name.
        component: String,
        /// Method name.
        method: String,
    },

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The external scoring network failed.
    #[error("Scorer error: {0}")]
    Scorer(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Error from the core types.
    #[error(transparent)]
    Core(#[from] coref_core::Error),
}

impl Error {
    /// Create a contract violation error.
    #[must_use]
    pub fn contract(component: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ContractViolation {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a not supported error.
    #[must_use]
    pub fn not_supported(component: impl Into<String>, method: impl Into<String>) -> Self {
        Error::NotSupported {
            component: component.into(),
            method: method.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a scorer error.
    #[must_use]
    pub fn scorer(msg: impl Into<String>) -> Self {
        Error::Scorer(msg.into())
    }

    /// Check if this is a "not supported" signal rather than a failure.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Error::NotSupported { .. })
    }
}
