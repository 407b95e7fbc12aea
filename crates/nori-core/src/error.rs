//! Error types for nori service settings synchronization
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::image::Violation;

/// Result type alias for nori operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed service record, identity or change event
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Image record failed one or more hard checks
    #[error("Invalid image: {}", describe_violations(.violations))]
    InvalidImage {
        /// Every violated constraint, in check order
        violations: Vec<Violation>,
    },

    /// Update targeted an identity the store does not hold
    #[error("Service not found: {0}")]
    NotFound(String),

    /// Backing store failed; the transaction was rolled back
    #[error("Storage error: {0}")]
    Storage(String),

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
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for rejected input: malformed records, identities, events or images
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidImage { .. })
    }

    /// True when an update targeted a missing identity
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True when the backing store failed
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
