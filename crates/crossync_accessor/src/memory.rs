//! In-memory reference accessor.

use crate::accessor::{Accessor, IdentityIter, StoredRecord};
use crate::error::{AccessorError, AccessorResult};
use crossync_record::{FieldChanges, IdentityKey, LocalId, Record};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

/// How [`InMemoryAccessor::delete`] treats an absent identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Deleting an absent identity fails with `NotFound`.
    #[default]
    Strict,
    /// Deleting an absent identity succeeds without effect.
    Idempotent,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    records: BTreeMap<u64, Record>,
    by_key: HashMap<IdentityKey, u64>,
}

/// An accessor keeping records in memory.
///
/// Suitable for:
/// - Unit and integration tests
/// - Ephemeral stores and caches
/// - A template for real backend adapters
///
/// Local identities are decimal sequence numbers starting at 1 and never
/// reused. Enumeration follows creation order. Stored copies carry no
/// origins and no dirty state.
///
/// # Thread Safety
///
/// All state sits behind one `RwLock`; the accessor can be shared
/// across threads.
///
/// # Example
///
/// ```rust
/// use crossync_accessor::{Accessor, InMemoryAccessor};
/// use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
///
/// let server = RecordType::builder("Server")
///     .field(FieldDescriptor::new("ip", FieldType::String))
///     .build()
///     .unwrap();
/// let accessor = InMemoryAccessor::new();
/// let record = Record::new("host1", "dc1", server).unwrap();
///
/// let id = accessor.create(&record).unwrap();
/// assert_eq!(id.as_str(), "1");
/// assert_eq!(accessor.find(record.identity_key()).unwrap().id, id);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryAccessor {
    inner: RwLock<Inner>,
    delete_policy: DeletePolicy,
}

impl InMemoryAccessor {
    /// Creates an empty accessor with the strict delete policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the delete policy.
    #[must_use]
    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// Returns the delete policy.
    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Returns true if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    fn parse_id(id: &LocalId) -> Option<u64> {
        id.as_str().parse().ok()
    }
}

impl Accessor for InMemoryAccessor {
    fn get(&self, id: &LocalId) -> AccessorResult<Record> {
        let inner = self.inner.read();
        Self::parse_id(id)
            .and_then(|n| inner.records.get(&n))
            .cloned()
            .ok_or_else(|| AccessorError::NotFound(id.clone()))
    }

    fn find(&self, key: &IdentityKey) -> AccessorResult<StoredRecord> {
        let inner = self.inner.read();
        let n = inner
            .by_key
            .get(key)
            .copied()
            .ok_or_else(|| AccessorError::KeyNotFound(key.clone()))?;
        let record = inner
            .records
            .get(&n)
            .cloned()
            .ok_or_else(|| AccessorError::KeyNotFound(key.clone()))?;
        Ok(StoredRecord {
            id: LocalId::new(n.to_string()),
            record,
        })
    }

    fn create(&self, record: &Record) -> AccessorResult<LocalId> {
        record.validate()?;

        let mut inner = self.inner.write();
        if inner.by_key.contains_key(record.identity_key()) {
            return Err(AccessorError::Conflict(record.identity_key().clone()));
        }

        inner.next_id += 1;
        let n = inner.next_id;

        let mut stored = record.clone();
        stored.clear_origins();
        stored.commit();

        inner.by_key.insert(record.identity_key().clone(), n);
        inner.records.insert(n, stored);
        Ok(LocalId::new(n.to_string()))
    }

    fn update(&self, id: &LocalId, changes: &FieldChanges) -> AccessorResult<()> {
        let n = Self::parse_id(id).ok_or_else(|| AccessorError::NotFound(id.clone()))?;
        let mut inner = self.inner.write();
        let record = inner
            .records
            .get_mut(&n)
            .ok_or_else(|| AccessorError::NotFound(id.clone()))?;

        let mut updated = record.clone();
        updated.apply(changes)?;
        updated.validate()?;
        *record = updated;
        Ok(())
    }

    fn delete(&self, id: &LocalId) -> AccessorResult<()> {
        let mut inner = self.inner.write();
        let removed = Self::parse_id(id).and_then(|n| inner.records.remove(&n));

        match removed {
            Some(record) => {
                inner.by_key.remove(record.identity_key());
                Ok(())
            }
            None if self.delete_policy == DeletePolicy::Idempotent => Ok(()),
            None => Err(AccessorError::NotFound(id.clone())),
        }
    }

    fn enumerate_identities(&self, type_name: &str) -> AccessorResult<IdentityIter> {
        let ids: Vec<LocalId> = self
            .inner
            .read()
            .records
            .iter()
            .filter(|(_, record)| record.identity_key().type_name() == type_name)
            .map(|(n, _)| LocalId::new(n.to_string()))
            .collect();
        Ok(Box::new(ids.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossync_record::{FieldDescriptor, FieldType, FieldValue, RecordType};
    use std::sync::Arc;

    fn server_type() -> Arc<crossync_record::RecordType> {
        RecordType::builder("Server")
            .field(FieldDescriptor::new("ip", FieldType::String).required())
            .field(FieldDescriptor::new("port", FieldType::Int).with_default(22))
            .build()
            .unwrap()
    }

    fn server(name: &str, ip: &str) -> Record {
        Record::new(name, "dc1", server_type())
            .unwrap()
            .with_field("ip", ip)
            .unwrap()
    }

    #[test]
    fn memory_new_is_empty() {
        let accessor = InMemoryAccessor::new();
        assert!(accessor.is_empty());
        assert_eq!(accessor.delete_policy(), DeletePolicy::Strict);
    }

    #[test]
    fn memory_create_assigns_sequential_ids() {
        let accessor = InMemoryAccessor::new();
        let a = accessor.create(&server("host1", "10.0.0.1")).unwrap();
        let b = accessor.create(&server("host2", "10.0.0.2")).unwrap();
        assert_eq!(a.as_str(), "1");
        assert_eq!(b.as_str(), "2");
        assert_eq!(accessor.len(), 2);
    }

    #[test]
    fn memory_create_conflicts_on_same_key() {
        let accessor = InMemoryAccessor::new();
        accessor.create(&server("host1", "10.0.0.1")).unwrap();
        let result = accessor.create(&server("host1", "10.9.9.9"));
        assert!(matches!(result, Err(AccessorError::Conflict(_))));
        assert_eq!(accessor.len(), 1);
    }

    #[test]
    fn memory_create_requires_fields() {
        let accessor = InMemoryAccessor::new();
        let incomplete = Record::new("host1", "dc1", server_type()).unwrap();
        assert!(matches!(
            accessor.create(&incomplete),
            Err(AccessorError::Record(_))
        ));
    }

    #[test]
    fn memory_stored_copy_has_no_origins() {
        let accessor = InMemoryAccessor::new();
        let mut record = server("host1", "10.0.0.1");
        record.add_origin("elsewhere", LocalId::new("42"));
        let id = accessor.create(&record).unwrap();
        assert!(accessor.get(&id).unwrap().origins().is_empty());
    }

    #[test]
    fn memory_find_by_key() {
        let accessor = InMemoryAccessor::new();
        let record = server("host1", "10.0.0.1");
        let id = accessor.create(&record).unwrap();

        let found = accessor.find(record.identity_key()).unwrap();
        assert_eq!(found.id, id);
        assert!(found.record.same_values(&record));

        let missing = IdentityKey::new("host9", "dc1", "Server").unwrap();
        assert!(accessor.find(&missing).unwrap_err().is_not_found());
    }

    #[test]
    fn memory_update_applies_changes() {
        let accessor = InMemoryAccessor::new();
        let id = accessor.create(&server("host1", "10.0.0.1")).unwrap();

        accessor
            .update(&id, &FieldChanges::new().with("port", 2222))
            .unwrap();
        assert_eq!(
            accessor.get(&id).unwrap().get("port").unwrap(),
            &FieldValue::Int(2222)
        );
    }

    #[test]
    fn memory_update_missing_fails() {
        let accessor = InMemoryAccessor::new();
        let result = accessor.update(&LocalId::new("7"), &FieldChanges::new());
        assert!(matches!(result, Err(AccessorError::NotFound(_))));

        let result = accessor.update(&LocalId::new("not-a-number"), &FieldChanges::new());
        assert!(matches!(result, Err(AccessorError::NotFound(_))));
    }

    #[test]
    fn memory_update_cannot_clear_required() {
        let accessor = InMemoryAccessor::new();
        let id = accessor.create(&server("host1", "10.0.0.1")).unwrap();
        let result = accessor.update(&id, &FieldChanges::new().with("ip", FieldValue::Null));
        assert!(matches!(result, Err(AccessorError::Record(_))));
        assert_eq!(
            accessor.get(&id).unwrap().get("ip").unwrap().as_str(),
            Some("10.0.0.1")
        );
    }

    #[test]
    fn memory_delete_frees_key() {
        let accessor = InMemoryAccessor::new();
        let record = server("host1", "10.0.0.1");
        let id = accessor.create(&record).unwrap();

        accessor.delete(&id).unwrap();
        assert!(accessor.is_empty());
        assert!(accessor.find(record.identity_key()).is_err());

        // the key can be created again, under a fresh identity
        let again = accessor.create(&record).unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn memory_delete_strict_and_idempotent() {
        let strict = InMemoryAccessor::new();
        assert!(matches!(
            strict.delete(&LocalId::new("1")),
            Err(AccessorError::NotFound(_))
        ));

        let lenient = InMemoryAccessor::new().with_delete_policy(DeletePolicy::Idempotent);
        assert!(lenient.delete(&LocalId::new("1")).is_ok());
    }

    #[test]
    fn memory_enumerate_filters_by_type_and_restarts() {
        let accessor = InMemoryAccessor::new();
        accessor.create(&server("host1", "10.0.0.1")).unwrap();
        accessor.create(&server("host2", "10.0.0.2")).unwrap();

        let switch = RecordType::builder("Switch").build().unwrap();
        accessor
            .create(&Record::new("sw1", "dc1", switch).unwrap())
            .unwrap();

        let first: Vec<_> = accessor.enumerate_identities("Server").unwrap().collect();
        assert_eq!(first, vec![LocalId::new("1"), LocalId::new("2")]);

        let second: Vec<_> = accessor.enumerate_identities("Server").unwrap().collect();
        assert_eq!(first, second);

        assert_eq!(accessor.enumerate_identities("Switch").unwrap().count(), 1);
        assert_eq!(accessor.enumerate_identities("Rack").unwrap().count(), 0);
    }
}
