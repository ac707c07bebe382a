//! Error types for the event log
//!
//! Every failure in the log engine is returned to the caller. Nothing is
//! logged-and-swallowed, and nothing is retried implicitly.

use thiserror::Error;

/// Errors that can occur in registry, store, writer, and reader operations
#[derive(Debug, Error)]
pub enum LogError {
    /// A write or filter referenced a severity that is not registered
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),

    /// A registration collided with an existing severity name
    #[error("Duplicate severity: {0}")]
    DuplicateSeverity(String),

    /// A severity name was empty or otherwise unusable
    #[error("Invalid severity name: {0:?}")]
    InvalidSeverityName(String),

    /// The persistence layer could not accept or serve the operation
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Malformed query parameters (e.g. an inverted time range)
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Error encoding a record for storage
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error decoding a stored record
    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl LogError {
    /// Create a new UnknownSeverity error
    pub fn unknown_severity(severity: impl Into<String>) -> Self {
        Self::UnknownSeverity(severity.into())
    }

    /// Create a new DuplicateSeverity error
    pub fn duplicate_severity(name: impl Into<String>) -> Self {
        Self::DuplicateSeverity(name.into())
    }

    /// Create a new StorageUnavailable error from any displayable cause
    pub fn storage(cause: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(cause.to_string())
    }

    /// Create a new InvalidFilter error
    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }

    /// Whether the caller may reasonably retry the same operation later
    ///
    /// Only storage unavailability is transient; every other error will
    /// fail the same way on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<std::io::Error> for LogError {
    fn from(err: std::io::Error) -> Self {
        LogError::StorageUnavailable(err.to_string())
    }
}

/// Convert from postcard Error to LogError
impl From<postcard::Error> for LogError {
    fn from(err: postcard::Error) -> Self {
        LogError::Deserialization(err.to_string())
    }
}
