//! Error types for stores and synchronizers.

use crossync_accessor::AccessorError;
use crossync_record::{IdentityKey, LocalId, RecordError};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for synchronizer operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by a [`crate::Store`].
///
/// Every variant names the store, so a failure collected from a
/// propagation chain can be traced back to its backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record holds this local identity.
    #[error("store {store}: no record with local identity {id}")]
    NotFound {
        /// Store id.
        store: String,
        /// The missing identity.
        id: LocalId,
    },

    /// No record matches this identity key.
    #[error("store {store}: no record matches {key}")]
    KeyNotFound {
        /// Store id.
        store: String,
        /// The missing key.
        key: IdentityKey,
    },

    /// A record with this identity key already exists.
    #[error("store {store}: {key} already exists")]
    Conflict {
        /// Store id.
        store: String,
        /// The duplicated key.
        key: IdentityKey,
    },

    /// The record was rejected by its schema.
    #[error("store {store}: {operation} rejected: {source}")]
    Invalid {
        /// Store id.
        store: String,
        /// Primitive that was called.
        operation: &'static str,
        /// Schema violation.
        #[source]
        source: RecordError,
    },

    /// The accessor's backend failed.
    #[error("store {store}: {operation} failed: {source}")]
    Backend {
        /// Store id.
        store: String,
        /// Primitive that was called.
        operation: &'static str,
        /// Adapter-specific error.
        #[source]
        source: AccessorError,
    },
}

impl StoreError {
    /// Wraps an accessor error with the store id and primitive name.
    pub fn from_accessor(store: &str, operation: &'static str, err: AccessorError) -> Self {
        let store = store.to_owned();
        match err {
            AccessorError::NotFound(id) => Self::NotFound { store, id },
            AccessorError::KeyNotFound(key) => Self::KeyNotFound { store, key },
            AccessorError::Conflict(key) => Self::Conflict { store, key },
            AccessorError::Record(source) => Self::Invalid {
                store,
                operation,
                source,
            },
            source @ AccessorError::Backend { .. } => Self::Backend {
                store,
                operation,
                source,
            },
        }
    }

    /// Returns the id of the store that raised the error.
    pub fn store(&self) -> &str {
        match self {
            Self::NotFound { store, .. }
            | Self::KeyNotFound { store, .. }
            | Self::Conflict { store, .. }
            | Self::Invalid { store, .. }
            | Self::Backend { store, .. } => store,
        }
    }

    /// Returns true for `NotFound` and `KeyNotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::KeyNotFound { .. })
    }

    /// Returns true for `Conflict`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by a [`crate::Synchronizer`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The key is already being propagated by this synchronizer.
    ///
    /// This is the expected outcome of a replicated write notifying the
    /// synchronizer that issued it, not a failure.
    #[error("propagation of {key} already in flight")]
    LoopSuppressed {
        /// Identity key of the suppressed event.
        key: IdentityKey,
    },

    /// The store is not attached to this synchronizer.
    #[error("store {0} is not attached")]
    UnknownStore(String),

    /// A read on the reference store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Returns true if this error is loop suppression.
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::LoopSuppressed { .. })
    }
}

/// A subscriber failed to handle a change event.
#[derive(Debug, Clone, Error)]
#[error("subscriber {subscriber} failed: {message}")]
pub struct SubscriberError {
    /// Subscriber id.
    pub subscriber: String,
    /// Failure description.
    pub message: String,
}

impl SubscriberError {
    /// Creates a subscriber error.
    pub fn new(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }
}
