//! Error types for the advisor crates.
//!
//! One enum covers every failure category the retrieval core can report.
//! "Nothing matched" is never an error: unknown collections and empty tier
//! intersections are represented as `None` or empty result sets by callers.

use thiserror::Error;

/// Unified error type for the advisor crates.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid caller input, raised before any I/O happens
    #[error("Validation error: {0}")]
    Validation(String),

    /// Vector store unreachable for a collection that exists in the catalog
    #[error("Connection error: {0}")]
    Connection(String),

    /// A request (or a single collection call) exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Embedding provider errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether the error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
