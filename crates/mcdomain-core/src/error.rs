//! Error types for mcdomain
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for mcdomain operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for mcdomain
#[derive(Error, Debug)]
pub enum Error {
    /// The declaration's label selector cannot be compiled into a matcher
    #[error("Malformed selector: {0}")]
    MalformedSelector(String),

    /// The query capability failed while looking something up
    #[error("Lookup failed ({what})")]
    Lookup {
        /// What was being looked up (e.g. "clusters in ns1")
        what: String,
        /// The underlying store error
        #[source]
        source: Box<Error>,
    },

    /// Object store errors (transport/storage)
    #[error("Object store error: {0}")]
    Store(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a malformed selector error
    pub fn malformed_selector(msg: impl Into<String>) -> Self {
        Self::MalformedSelector(msg.into())
    }

    /// Wrap a query failure, keeping it as the error source
    pub fn lookup(what: impl Into<String>, source: Error) -> Self {
        Self::Lookup {
            what: what.into(),
            source: Box::new(source),
        }
    }

    /// Create an object store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the engine may retry the reconciliation that produced this error
    ///
    /// A malformed selector only goes away when the declaration is edited,
    /// and an edit is itself a new trigger.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MalformedSelector(_) | Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
