//! Error types for the event timeline.

use thiserror::Error;

/// Errors that can occur in the event timeline.
#[derive(Debug, Error)]
pub enum TimelineError {
    /// A time-travel target was outside the current bounds of the log.
    #[error("index {index} out of range for log of length {len}")]
    OutOfRange {
        /// The requested position.
        index: usize,
        /// The log length at the time of the request.
        len: usize,
    },

    /// The operation was invoked before persisted state finished loading.
    #[error("timeline not initialized: persisted state is still loading")]
    NotInitialized,

    /// A portable document failed structural validation.
    #[error("malformed import: {0}")]
    MalformedImport(String),

    /// The durable store failed to read or write.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A subscriber callback panicked.
    #[error("subscriber failure: {0}")]
    Subscriber(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for timeline operations.
pub type Result<T> = std::result::Result<T, TimelineError>;
