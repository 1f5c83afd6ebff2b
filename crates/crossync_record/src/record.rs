//! Records, local identities and field change sets.

use crate::error::{RecordError, RecordResult};
use crate::field::FieldValue;
use crate::identity::IdentityKey;
use crate::schema::RecordType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Store-local identity (primary key) assigned by an accessor.
///
/// Local identities are meaningful only inside the store that assigned
/// them and are never part of the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    /// Wraps a backend primary key.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LocalId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for LocalId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A set of field assignments, keyed by field name.
///
/// Assigning `Null` resets a field to its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldChanges(BTreeMap<String, FieldValue>);

impl FieldChanges {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an assignment, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    /// Adds or replaces an assignment.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(field.into(), value.into());
    }

    /// Returns the assigned value for `field`.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Iterates assignments in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of assignments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is assigned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldChanges {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A typed bag of field values identified by name, context and type.
///
/// A record also carries its provenance: for each store holding a
/// replica, the local identity that store assigned. Field assignments
/// made through [`Record::set`] are tracked until [`Record::commit`] or
/// [`Record::rollback`].
#[derive(Debug, Clone)]
pub struct Record {
    key: IdentityKey,
    record_type: Arc<RecordType>,
    fields: BTreeMap<String, FieldValue>,
    previous: BTreeMap<String, FieldValue>,
    origins: BTreeMap<String, LocalId>,
}

impl Record {
    /// Creates a record with every field at its default.
    pub fn new(
        name: impl Into<String>,
        context_name: impl Into<String>,
        record_type: Arc<RecordType>,
    ) -> RecordResult<Self> {
        let key = IdentityKey::new(name, context_name, record_type.name())?;
        Ok(Self {
            key,
            record_type,
            fields: BTreeMap::new(),
            previous: BTreeMap::new(),
            origins: BTreeMap::new(),
        })
    }

    /// Sets a field during construction, without dirty tracking.
    pub fn with_field(
        mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> RecordResult<Self> {
        let field = field.into();
        let value = value.into();
        self.record_type.check_field(&field, &value)?;
        self.store_value(field, value);
        Ok(self)
    }

    /// Returns the identity key.
    pub fn identity_key(&self) -> &IdentityKey {
        &self.key
    }

    /// Returns the record name.
    pub fn name(&self) -> &str {
        self.key.name()
    }

    /// Returns the owning context name.
    pub fn context_name(&self) -> &str {
        self.key.context_name()
    }

    /// Returns the record type.
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    /// Returns the resolved value of `field`.
    pub fn get(&self, field: &str) -> RecordResult<&FieldValue> {
        let desc = self
            .record_type
            .field(field)
            .ok_or_else(|| RecordError::UnknownField {
                record_type: self.record_type.name().to_owned(),
                field: field.to_owned(),
            })?;
        Ok(desc.resolve(self.fields.get(field)))
    }

    /// Iterates every declared field with its resolved value, in
    /// declaration order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.record_type
            .fields()
            .iter()
            .map(move |desc| (desc.name(), desc.resolve(self.fields.get(desc.name()))))
    }

    /// Assigns a field, remembering its prior value.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> RecordResult<()> {
        let value = value.into();
        self.record_type.check_field(field, &value)?;

        let old = self.fields.get(field).cloned().unwrap_or(FieldValue::Null);
        if old == value {
            return Ok(());
        }

        match self.previous.get(field) {
            // back to the committed value
            Some(committed) if *committed == value => {
                self.previous.remove(field);
            }
            Some(_) => {}
            None => {
                self.previous.insert(field.to_owned(), old);
            }
        }
        self.store_value(field.to_owned(), value);
        Ok(())
    }

    /// Applies a change set. Nothing is applied if any assignment is
    /// invalid. Applied changes are not tracked as dirty.
    pub fn apply(&mut self, changes: &FieldChanges) -> RecordResult<()> {
        for (field, value) in changes.iter() {
            self.record_type.check_field(field, value)?;
        }
        for (field, value) in changes.iter() {
            self.store_value(field.to_owned(), value.clone());
        }
        Ok(())
    }

    /// Checks that every required field resolves to a value.
    pub fn validate(&self) -> RecordResult<()> {
        for (field, value) in self.values() {
            let required = self
                .record_type
                .field(field)
                .is_some_and(|desc| desc.is_required());
            if required && value.is_null() {
                return Err(RecordError::MissingRequired {
                    record_type: self.record_type.name().to_owned(),
                    field: field.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Returns true if fields were assigned since the last commit.
    pub fn is_dirty(&self) -> bool {
        !self.previous.is_empty()
    }

    /// Returns the current values of the fields assigned since the last
    /// commit.
    pub fn changes(&self) -> FieldChanges {
        self.previous
            .keys()
            .map(|field| {
                let value = self.fields.get(field).cloned().unwrap_or(FieldValue::Null);
                (field.clone(), value)
            })
            .collect()
    }

    /// Returns every declared field with its resolved value.
    pub fn snapshot(&self) -> FieldChanges {
        self.values()
            .map(|(field, value)| (field, value.clone()))
            .collect()
    }

    /// Forgets the tracked prior values.
    pub fn commit(&mut self) {
        self.previous.clear();
    }

    /// Restores the values held at the last commit.
    pub fn rollback(&mut self) {
        for (field, old) in std::mem::take(&mut self.previous) {
            self.store_value(field, old);
        }
    }

    /// Returns the store-local identities of known replicas.
    pub fn origins(&self) -> &BTreeMap<String, LocalId> {
        &self.origins
    }

    /// Returns the local identity assigned by `store`, if known.
    pub fn origin(&self, store: &str) -> Option<&LocalId> {
        self.origins.get(store)
    }

    /// Records that `store` holds a replica under `id`.
    pub fn add_origin(&mut self, store: impl Into<String>, id: LocalId) {
        self.origins.insert(store.into(), id);
    }

    /// Forgets the replica held by `store`.
    pub fn remove_origin(&mut self, store: &str) -> Option<LocalId> {
        self.origins.remove(store)
    }

    /// Forgets every replica.
    pub fn clear_origins(&mut self) {
        self.origins.clear();
    }

    /// Returns true if both records denote the same logical entity.
    pub fn same_entity(&self, other: &Record) -> bool {
        self.key == other.key
    }

    /// Returns true if both records resolve every field to equal values.
    pub fn same_values(&self, other: &Record) -> bool {
        self.same_entity(other) && self.values().eq(other.values())
    }

    /// Returns true if every field in `filter` resolves to the filter's
    /// value. An empty filter matches every record; a field the type does
    /// not declare matches none.
    pub fn matches(&self, filter: &FieldChanges) -> bool {
        filter
            .iter()
            .all(|(field, value)| self.get(field).is_ok_and(|v| v == value))
    }

    fn store_value(&mut self, field: String, value: FieldValue) {
        if value.is_null() {
            self.fields.remove(&field);
        } else {
            self.fields.insert(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldType};

    fn server_type() -> Arc<RecordType> {
        RecordType::builder("Server")
            .field(FieldDescriptor::new("ip", FieldType::String).required())
            .field(FieldDescriptor::new("port", FieldType::Int).with_default(22))
            .field(FieldDescriptor::new("active", FieldType::Bool))
            .build()
            .unwrap()
    }

    fn host1() -> Record {
        Record::new("host1", "dc1", server_type())
            .unwrap()
            .with_field("ip", "10.0.0.1")
            .unwrap()
    }

    #[test]
    fn defaults_resolve_for_missing_fields() {
        let record = host1();
        assert_eq!(record.get("port").unwrap(), &FieldValue::Int(22));
        assert!(record.get("active").unwrap().is_null());
        assert!(matches!(
            record.get("os"),
            Err(RecordError::UnknownField { .. })
        ));
    }

    #[test]
    fn identity_ignores_field_values() {
        let a = host1();
        let b = host1().with_field("ip", "10.9.9.9").unwrap();
        assert!(a.same_entity(&b));
        assert!(!a.same_values(&b));
        assert_eq!(a.identity_key(), b.identity_key());
        assert_eq!(a.identity_key().type_name(), "Server");
    }

    #[test]
    fn set_tracks_dirty_fields() {
        let mut record = host1();
        assert!(!record.is_dirty());

        record.set("port", 2222).unwrap();
        record.set("port", 2223).unwrap();
        assert!(record.is_dirty());
        assert_eq!(
            record.changes(),
            FieldChanges::new().with("port", 2223)
        );

        record.rollback();
        assert!(!record.is_dirty());
        assert_eq!(record.get("port").unwrap(), &FieldValue::Int(22));
    }

    #[test]
    fn setting_same_value_is_not_dirty() {
        let mut record = host1();
        record.set("ip", "10.0.0.1").unwrap();
        assert!(!record.is_dirty());
    }

    #[test]
    fn restoring_committed_value_clears_dirty_state() {
        let mut record = host1();
        record.set("ip", "10.0.0.2").unwrap();
        record.set("port", 2222).unwrap();

        record.set("ip", "10.0.0.1").unwrap();
        assert_eq!(record.changes(), FieldChanges::new().with("port", 2222));

        record.set("port", FieldValue::Null).unwrap();
        assert!(!record.is_dirty());
        assert!(record.changes().is_empty());
    }

    #[test]
    fn matches_compares_resolved_values() {
        let record = host1();
        assert!(record.matches(&FieldChanges::new()));
        assert!(record.matches(&FieldChanges::new().with("ip", "10.0.0.1").with("port", 22)));
        assert!(record.matches(&FieldChanges::new().with("active", FieldValue::Null)));
        assert!(!record.matches(&FieldChanges::new().with("ip", "10.0.0.2")));
        assert!(!record.matches(&FieldChanges::new().with("os", "linux")));
    }

    #[test]
    fn commit_keeps_values() {
        let mut record = host1();
        record.set("active", true).unwrap();
        record.commit();
        assert!(!record.is_dirty());
        assert_eq!(record.get("active").unwrap(), &FieldValue::Bool(true));
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut record = host1();
        assert!(record.set("port", "eighty").is_err());
        assert!(!record.is_dirty());
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let mut record = host1();
        let bad = FieldChanges::new().with("port", 80).with("ip", 10);
        assert!(record.apply(&bad).is_err());
        assert_eq!(record.get("port").unwrap(), &FieldValue::Int(22));

        let good = FieldChanges::new().with("port", 80).with("active", true);
        record.apply(&good).unwrap();
        assert_eq!(record.get("port").unwrap(), &FieldValue::Int(80));
        assert!(!record.is_dirty());
    }

    #[test]
    fn null_resets_to_default() {
        let mut record = host1().with_field("port", 8080).unwrap();
        record
            .apply(&FieldChanges::new().with("port", FieldValue::Null))
            .unwrap();
        assert_eq!(record.get("port").unwrap(), &FieldValue::Int(22));
    }

    #[test]
    fn validate_requires_fields() {
        let record = Record::new("host2", "dc1", server_type()).unwrap();
        assert!(matches!(
            record.validate(),
            Err(RecordError::MissingRequired { .. })
        ));
        assert!(host1().validate().is_ok());
    }

    #[test]
    fn snapshot_lists_all_declared_fields() {
        let snapshot = host1().snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("port"), Some(&FieldValue::Int(22)));
        assert_eq!(snapshot.get("active"), Some(&FieldValue::Null));
    }

    #[test]
    fn origins_are_per_store() {
        let mut record = host1();
        record.add_origin("a", LocalId::new("1"));
        record.add_origin("b", LocalId::new("x-9"));
        assert_eq!(record.origin("a"), Some(&LocalId::new("1")));
        assert_eq!(record.remove_origin("b"), Some(LocalId::new("x-9")));
        assert_eq!(record.origins().len(), 1);
    }
}
