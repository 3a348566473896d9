//! Error types for crine.
//!
//! This module defines the errors surfaced by the data-access client. Store
//! failures are wrapped unmodified in [`Error::Backend`] so callers can still
//! tell a missing document from a permission problem.

use thiserror::Error;

use crate::store::StoreError;

/// The main error type for crine operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Session Errors ===
    /// The operation requires a signed-in principal and none is present.
    #[error("not signed in: this operation requires an authenticated user")]
    Unauthenticated,

    // === Business Rule Errors ===
    /// The user already holds the maximum number of customers.
    #[error("customer limit reached ({limit} customers)")]
    QuotaExceeded {
        /// The limit that was in force for the user, as stored.
        limit: serde_json::Number,
    },

    // === Request Errors ===
    /// A listing was asked for zero entries.
    #[error("invalid limit {limit}: must be at least 1")]
    InvalidLimit {
        /// The rejected limit.
        limit: usize,
    },

    // === Path Errors ===
    /// A document id or path segment cannot be used to address a document.
    #[error("invalid document path '{path}': {reason}")]
    InvalidPath {
        /// The offending path or segment.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    // === Backend Errors ===
    /// The document store reported a failure.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for crine operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid path error.
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error means no principal was signed in.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }

    /// Check if this error is a customer quota rejection.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Check if the backend reported a missing document.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Backend(StoreError::NotFound { .. }))
    }
}
