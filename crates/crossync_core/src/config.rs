//! Configuration for synchronizers.

use crate::event::OperationSet;
use serde::{Deserialize, Serialize};

/// Default number of identities replayed per reconciliation step.
pub const DEFAULT_RECONCILE_BATCH_SIZE: usize = 5000;

/// Configuration for a [`crate::Synchronizer`].
///
/// Deserializable so the embedding application can load it alongside
/// its store definitions; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Synchronizer id, also its subscriber id on every attached store.
    pub id: String,
    /// Number of identities fetched per reconciliation step.
    pub reconcile_batch_size: usize,
    /// Operations replicated on change notifications.
    pub operations: OperationSet,
}

impl SyncConfig {
    /// Creates a configuration with default settings.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            reconcile_batch_size: DEFAULT_RECONCILE_BATCH_SIZE,
            operations: OperationSet::all(),
        }
    }

    /// Sets the reconciliation batch size. Zero is treated as one.
    pub fn with_reconcile_batch_size(mut self, size: usize) -> Self {
        self.reconcile_batch_size = size;
        self
    }

    /// Sets the replicated operations.
    pub fn with_operations(mut self, operations: OperationSet) -> Self {
        self.operations = operations;
        self
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.reconcile_batch_size.max(1)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("synchronizer")
    }
}
