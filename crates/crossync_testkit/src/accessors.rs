//! Instrumented accessors.
//!
//! Wrappers around any [`Accessor`] that record the primitives called on
//! it or fail them on demand. Each wrapper hands out a shared handle so a
//! test can inspect or steer the accessor after a store has taken
//! ownership of it.

use crossync_accessor::{Accessor, AccessorError, AccessorResult, IdentityIter, StoredRecord};
use crossync_record::{FieldChanges, IdentityKey, LocalId, Record};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// An accessor primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `get`
    Get,
    /// `find`
    Find,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
    /// `enumerate_identities`
    Enumerate,
}

impl Primitive {
    /// The primitives that write to the backend.
    pub const WRITES: [Primitive; 3] = [Primitive::Create, Primitive::Update, Primitive::Delete];
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Primitive::Get => "get",
            Primitive::Find => "find",
            Primitive::Create => "create",
            Primitive::Update => "update",
            Primitive::Delete => "delete",
            Primitive::Enumerate => "enumerate_identities",
        };
        f.write_str(name)
    }
}

/// Shared log of primitive calls, in call order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Primitive>>>);

impl CallLog {
    fn push(&self, primitive: Primitive) {
        self.0.lock().push(primitive);
    }

    /// Returns every recorded call.
    pub fn calls(&self) -> Vec<Primitive> {
        self.0.lock().clone()
    }

    /// Returns how often `primitive` was called.
    pub fn count(&self, primitive: Primitive) -> usize {
        self.0.lock().iter().filter(|p| **p == primitive).count()
    }

    /// Returns the number of write calls.
    pub fn writes(&self) -> usize {
        Primitive::WRITES.iter().map(|p| self.count(*p)).sum()
    }

    /// Returns the total number of calls.
    pub fn total(&self) -> usize {
        self.0.lock().len()
    }

    /// Forgets every recorded call.
    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Records every primitive call before forwarding it.
///
/// # Example
///
/// ```rust
/// use crossync_accessor::{Accessor, InMemoryAccessor};
/// use crossync_testkit::{server, Primitive, RecordingAccessor};
///
/// let (accessor, log) = RecordingAccessor::new(InMemoryAccessor::new());
/// accessor.create(&server("host1", "dc1", "10.0.0.1")).unwrap();
/// assert_eq!(log.calls(), vec![Primitive::Create]);
/// ```
#[derive(Debug)]
pub struct RecordingAccessor<A> {
    inner: A,
    log: CallLog,
}

impl<A: Accessor> RecordingAccessor<A> {
    /// Wraps `inner` and returns the call log handle.
    pub fn new(inner: A) -> (Self, CallLog) {
        let log = CallLog::default();
        (
            Self {
                inner,
                log: log.clone(),
            },
            log,
        )
    }
}

impl<A: Accessor> Accessor for RecordingAccessor<A> {
    fn get(&self, id: &LocalId) -> AccessorResult<Record> {
        self.log.push(Primitive::Get);
        self.inner.get(id)
    }

    fn find(&self, key: &IdentityKey) -> AccessorResult<StoredRecord> {
        self.log.push(Primitive::Find);
        self.inner.find(key)
    }

    fn create(&self, record: &Record) -> AccessorResult<LocalId> {
        self.log.push(Primitive::Create);
        self.inner.create(record)
    }

    fn update(&self, id: &LocalId, changes: &FieldChanges) -> AccessorResult<()> {
        self.log.push(Primitive::Update);
        self.inner.update(id, changes)
    }

    fn delete(&self, id: &LocalId) -> AccessorResult<()> {
        self.log.push(Primitive::Delete);
        self.inner.delete(id)
    }

    fn enumerate_identities(&self, type_name: &str) -> AccessorResult<IdentityIter> {
        self.log.push(Primitive::Enumerate);
        self.inner.enumerate_identities(type_name)
    }
}

/// Shared set of primitives a [`FailingAccessor`] must fail.
#[derive(Debug, Clone, Default)]
pub struct FailureSwitch(Arc<Mutex<HashSet<Primitive>>>);

impl FailureSwitch {
    /// Makes `primitive` fail from now on.
    pub fn fail(&self, primitive: Primitive) {
        self.0.lock().insert(primitive);
    }

    /// Makes every write primitive fail from now on.
    pub fn fail_writes(&self) {
        self.0.lock().extend(Primitive::WRITES);
    }

    /// Makes every primitive succeed again.
    pub fn heal(&self) {
        self.0.lock().clear();
    }

    /// Returns true if `primitive` is set to fail.
    pub fn is_failing(&self, primitive: Primitive) -> bool {
        self.0.lock().contains(&primitive)
    }

    fn check(&self, primitive: Primitive) -> AccessorResult<()> {
        if self.is_failing(primitive) {
            return Err(AccessorError::backend(format!("injected {primitive} failure")));
        }
        Ok(())
    }
}

/// Fails selected primitives with a `Backend` error, forwarding the rest.
///
/// # Example
///
/// ```rust
/// use crossync_accessor::{Accessor, InMemoryAccessor};
/// use crossync_testkit::{server, FailingAccessor, Primitive};
///
/// let (accessor, switch) = FailingAccessor::new(InMemoryAccessor::new());
/// switch.fail(Primitive::Create);
/// assert!(accessor.create(&server("host1", "dc1", "10.0.0.1")).is_err());
///
/// switch.heal();
/// assert!(accessor.create(&server("host1", "dc1", "10.0.0.1")).is_ok());
/// ```
#[derive(Debug)]
pub struct FailingAccessor<A> {
    inner: A,
    switch: FailureSwitch,
}

impl<A: Accessor> FailingAccessor<A> {
    /// Wraps `inner` and returns the switch handle. Nothing fails until
    /// the switch is set.
    pub fn new(inner: A) -> (Self, FailureSwitch) {
        let switch = FailureSwitch::default();
        (
            Self {
                inner,
                switch: switch.clone(),
            },
            switch,
        )
    }
}

impl<A: Accessor> Accessor for FailingAccessor<A> {
    fn get(&self, id: &LocalId) -> AccessorResult<Record> {
        self.switch.check(Primitive::Get)?;
        self.inner.get(id)
    }

    fn find(&self, key: &IdentityKey) -> AccessorResult<StoredRecord> {
        self.switch.check(Primitive::Find)?;
        self.inner.find(key)
    }

    fn create(&self, record: &Record) -> AccessorResult<LocalId> {
        self.switch.check(Primitive::Create)?;
        self.inner.create(record)
    }

    fn update(&self, id: &LocalId, changes: &FieldChanges) -> AccessorResult<()> {
        self.switch.check(Primitive::Update)?;
        self.inner.update(id, changes)
    }

    fn delete(&self, id: &LocalId) -> AccessorResult<()> {
        self.switch.check(Primitive::Delete)?;
        self.inner.delete(id)
    }

    fn enumerate_identities(&self, type_name: &str) -> AccessorResult<IdentityIter> {
        self.switch.check(Primitive::Enumerate)?;
        self.inner.enumerate_identities(type_name)
    }
}
