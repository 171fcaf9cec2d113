//! Error types for the pairs analytics system.
//!
//! Not-ready conditions (too few ticks, degenerate regression, warming-up
//! z-scores) are not errors; they travel as [`crate::Readiness::Waiting`].

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the pairs analytics system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or malformed data).
    #[error("Data error: {0}")]
    Data(String),

    /// Tick store error.
    #[error("Database error: {0}")]
    Database(String),

    /// Market feed transport error.
    #[error("Feed error: {0}")]
    Feed(String),

    /// Stationarity test could not produce a result.
    #[error("Stationarity test error: {0}")]
    Stationarity(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Create a feed error.
    pub fn feed(msg: impl Into<String>) -> Self {
        Error::Feed(msg.into())
    }

    /// Create a stationarity test error.
    pub fn stationarity(msg: impl Into<String>) -> Self {
        Error::Stationarity(msg.into())
    }
}
