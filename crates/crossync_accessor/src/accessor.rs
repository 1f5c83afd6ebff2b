//! Accessor capability contract.

use crate::error::AccessorResult;
use crossync_record::{FieldChanges, IdentityKey, LocalId, Record};

/// A finite sequence of local identities.
///
/// Enumeration is restartable by calling
/// [`Accessor::enumerate_identities`] again.
pub type IdentityIter = Box<dyn Iterator<Item = LocalId> + Send>;

/// A record together with the local identity its backend assigned.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    /// Local identity in the backend that returned the record.
    pub id: LocalId,
    /// The record.
    pub record: Record,
}

/// Backend-specific access to records.
///
/// Implementing these primitives is the whole integration surface for a
/// new backend (a SQL table, a REST-backed tracker, a CMDB).
///
/// # Invariants
///
/// - `find` is deterministic: if the backend can hold more than one
///   match, the accessor picks one arbitrarily but consistently
/// - `create` fails with `Conflict` if the identity key already exists
/// - `update` and `delete` fail with `NotFound` on an absent identity;
///   an accessor may instead treat delete of an absent identity as a
///   successful no-op, and must document that policy
/// - no operation has side effects outside its own backend
/// - accessors must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryAccessor`] - reference implementation
pub trait Accessor: Send + Sync {
    /// Returns the record stored under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is absent.
    fn get(&self, id: &LocalId) -> AccessorResult<Record>;

    /// Returns the record matching `key`.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if nothing matches.
    fn find(&self, key: &IdentityKey) -> AccessorResult<StoredRecord>;

    /// Stores a new record and returns its assigned local identity.
    ///
    /// # Errors
    ///
    /// `Conflict` if the identity key already exists, `Record` if a
    /// required field is missing.
    fn create(&self, record: &Record) -> AccessorResult<LocalId>;

    /// Applies field changes to the record stored under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is absent, `Record` if a change violates the
    /// schema.
    fn update(&self, id: &LocalId, changes: &FieldChanges) -> AccessorResult<()>;

    /// Removes the record stored under `id`.
    ///
    /// # Errors
    ///
    /// `NotFound` if `id` is absent, unless the accessor documents an
    /// idempotent delete policy.
    fn delete(&self, id: &LocalId) -> AccessorResult<()>;

    /// Lists the local identities of every record of `type_name`.
    ///
    /// Used for bulk reconciliation, not for per-event propagation.
    fn enumerate_identities(&self, type_name: &str) -> AccessorResult<IdentityIter>;
}

impl<A: Accessor + ?Sized> Accessor for Box<A> {
    fn get(&self, id: &LocalId) -> AccessorResult<Record> {
        (**self).get(id)
    }

    fn find(&self, key: &IdentityKey) -> AccessorResult<StoredRecord> {
        (**self).find(key)
    }

    fn create(&self, record: &Record) -> AccessorResult<LocalId> {
        (**self).create(record)
    }

    fn update(&self, id: &LocalId, changes: &FieldChanges) -> AccessorResult<()> {
        (**self).update(id, changes)
    }

    fn delete(&self, id: &LocalId) -> AccessorResult<()> {
        (**self).delete(id)
    }

    fn enumerate_identities(&self, type_name: &str) -> AccessorResult<IdentityIter> {
        (**self).enumerate_identities(type_name)
    }
}
