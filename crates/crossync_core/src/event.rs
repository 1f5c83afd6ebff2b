//! Change events emitted by stores after local mutations.

use crossync_record::{FieldChanges, IdentityKey, LocalId, Record};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

impl Operation {
    /// Returns the lowercase operation name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    /// Returns the single-operation set.
    pub const fn as_set(self) -> OperationSet {
        match self {
            Operation::Create => OperationSet::CREATE,
            Operation::Update => OperationSet::UPDATE,
            Operation::Delete => OperationSet::DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// A set of operations, used to choose what a synchronizer replicates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct OperationSet: u8 {
        /// Record creation.
        const CREATE = 1 << 0;
        /// Record update.
        const UPDATE = 1 << 1;
        /// Record deletion.
        const DELETE = 1 << 2;
    }
}

impl OperationSet {
    /// Returns true if `op` is in the set.
    pub fn includes(self, op: Operation) -> bool {
        self.contains(op.as_set())
    }
}

impl Default for OperationSet {
    fn default() -> Self {
        Self::all()
    }
}

/// A change notification.
///
/// Emitted synchronously by a store after a successful local mutation,
/// in subscription order.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Id of the store that applied the mutation.
    pub store_id: String,
    /// Kind of mutation.
    pub operation: Operation,
    /// The record after the mutation (before it, for deletes).
    pub record: Record,
    /// Local identity of the record in the emitting store.
    pub local_id: LocalId,
    /// Assigned fields: every field for creates, the changed fields for
    /// updates, nothing for deletes.
    pub changes: FieldChanges,
}

impl ChangeEvent {
    /// Creates a create event.
    pub fn create(store_id: impl Into<String>, record: Record, local_id: LocalId) -> Self {
        let changes = record.snapshot();
        Self {
            store_id: store_id.into(),
            operation: Operation::Create,
            record,
            local_id,
            changes,
        }
    }

    /// Creates an update event.
    pub fn update(
        store_id: impl Into<String>,
        record: Record,
        local_id: LocalId,
        changes: FieldChanges,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            operation: Operation::Update,
            record,
            local_id,
            changes,
        }
    }

    /// Creates a delete event.
    pub fn delete(store_id: impl Into<String>, record: Record, local_id: LocalId) -> Self {
        Self {
            store_id: store_id.into(),
            operation: Operation::Delete,
            record,
            local_id,
            changes: FieldChanges::new(),
        }
    }

    /// Creates an update event carrying every field of `record`.
    ///
    /// Used by reconciliation to replay a stored record.
    pub fn replay(store_id: impl Into<String>, record: Record, local_id: LocalId) -> Self {
        let changes = record.snapshot();
        Self::update(store_id, record, local_id, changes)
    }

    /// Returns the identity key of the changed record.
    pub fn identity_key(&self) -> &IdentityKey {
        self.record.identity_key()
    }
}
