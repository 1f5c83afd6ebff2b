//! Error types for accessor operations.

use crossync_record::{IdentityKey, LocalId, RecordError};
use std::error::Error as StdError;
use thiserror::Error;

/// Result type for accessor operations.
pub type AccessorResult<T> = Result<T, AccessorError>;

/// Errors an accessor may report.
#[derive(Debug, Error)]
pub enum AccessorError {
    /// No record holds this local identity.
    #[error("no record with local identity {0}")]
    NotFound(LocalId),

    /// No record matches this identity key.
    #[error("no record matches {0}")]
    KeyNotFound(IdentityKey),

    /// A record with this identity key already exists.
    #[error("{0} already exists")]
    Conflict(IdentityKey),

    /// The record violates its schema.
    #[error("invalid record: {0}")]
    Record(#[from] RecordError),

    /// The backend failed.
    #[error("backend failure: {message}")]
    Backend {
        /// Adapter-specific description.
        message: String,
        /// Underlying driver or client error.
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl AccessorError {
    /// Creates a backend failure from a message.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a backend failure wrapping a driver error.
    pub fn backend_with(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true for `NotFound` and `KeyNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::KeyNotFound(_))
    }

    /// Returns true for `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
