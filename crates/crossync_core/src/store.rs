//! Stores: the single point of mutation for one backend.

use crate::error::{StoreError, StoreResult, SubscriberError};
use crate::event::{ChangeEvent, Operation};
use crate::report::PropagationReport;
use crossync_accessor::{Accessor, AccessorError, IdentityIter, StoredRecord};
use crossync_record::{FieldChanges, IdentityKey, LocalId, Record};
use parking_lot::RwLock;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Receives change notifications from stores.
pub trait ChangeSubscriber: Send + Sync {
    /// Returns the subscriber id, used to label notices and to detach by
    /// name.
    fn subscriber_id(&self) -> &str;

    /// Handles a change event.
    ///
    /// Called synchronously after the store's mutation succeeded. An
    /// error is recorded by the store and delivery continues with the
    /// next subscriber.
    fn on_change(&self, event: &ChangeEvent) -> Result<Delivery, SubscriberError>;
}

/// What a subscriber did with a change event.
#[derive(Debug)]
pub enum Delivery {
    /// The event was accepted without replication.
    Acknowledged,
    /// The event was ignored because its key is already being propagated.
    Suppressed,
    /// The event was replicated to other stores.
    Propagated(PropagationReport),
}

/// Delivery outcome for one subscriber.
#[derive(Debug)]
pub struct SubscriberNotice {
    /// Subscriber id.
    pub subscriber: String,
    /// What the subscriber reported.
    pub outcome: Result<Delivery, SubscriberError>,
}

/// Result of a successful local mutation.
///
/// The local mutation is committed whatever the notices report;
/// propagation failures never roll it back.
#[derive(Debug)]
pub struct Mutation {
    /// Kind of mutation.
    pub operation: Operation,
    /// Local identity of the mutated record.
    pub local_id: LocalId,
    /// The record after the mutation. `None` when an idempotent accessor
    /// accepted the delete of an absent identity.
    pub record: Option<Record>,
    /// One notice per subscriber, in subscription order.
    pub notices: Vec<SubscriberNotice>,
}

impl Mutation {
    /// Iterates the propagation reports produced by subscribers.
    pub fn reports(&self) -> impl Iterator<Item = &PropagationReport> {
        self.notices.iter().filter_map(|notice| match &notice.outcome {
            Ok(Delivery::Propagated(report)) => Some(report),
            _ => None,
        })
    }

    /// Counts failed subscribers plus failed per-store replications.
    pub fn failure_count(&self) -> usize {
        self.notices
            .iter()
            .map(|notice| match &notice.outcome {
                Err(_) => 1,
                Ok(Delivery::Propagated(report)) => report.failure_count(),
                Ok(_) => 0,
            })
            .sum()
    }

    /// Returns true if every subscriber and replication succeeded.
    pub fn is_fully_propagated(&self) -> bool {
        self.failure_count() == 0
    }
}

/// Counters for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Records created.
    pub creates: u64,
    /// Records updated.
    pub updates: u64,
    /// Records deleted.
    pub deletes: u64,
    /// Change events emitted.
    pub events_emitted: u64,
    /// Subscriber calls that returned an error.
    pub subscriber_failures: u64,
}

struct Subscription {
    id: String,
    subscriber: Weak<dyn ChangeSubscriber>,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.subscriber.strong_count() > 0
    }

    fn is(&self, subscriber: &dyn ChangeSubscriber) -> bool {
        std::ptr::addr_eq(self.subscriber.as_ptr(), subscriber)
    }
}

/// Owner of one accessor and of the subscribers to its changes.
///
/// All reads and writes to the backend go through the store, which
/// translates accessor errors into [`StoreError`]s naming the store and,
/// after each successful mutation, notifies every live subscriber in
/// subscription order.
///
/// Subscribers are held weakly: dropping the last handle to a subscriber
/// ends its subscription.
///
/// # Example
///
/// ```rust
/// use crossync_accessor::InMemoryAccessor;
/// use crossync_core::Store;
/// use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
///
/// let server = RecordType::builder("Server")
///     .field(FieldDescriptor::new("ip", FieldType::String))
///     .build()
///     .unwrap();
/// let store = Store::new("cmdb", InMemoryAccessor::new());
///
/// let record = Record::new("host1", "dc1", server).unwrap();
/// let mutation = store.create(&record).unwrap();
/// let stored = store.get(&mutation.local_id).unwrap();
/// assert_eq!(stored.origin("cmdb"), Some(&mutation.local_id));
/// ```
pub struct Store {
    id: String,
    accessor: Box<dyn Accessor>,
    subscribers: RwLock<Vec<Subscription>>,
    stats: RwLock<StoreStats>,
}

impl Store {
    /// Creates a store owning `accessor`.
    pub fn new(id: impl Into<String>, accessor: impl Accessor + 'static) -> Self {
        Self {
            id: id.into(),
            accessor: Box::new(accessor),
            subscribers: RwLock::new(Vec::new()),
            stats: RwLock::new(StoreStats::default()),
        }
    }

    /// Returns the store id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the record stored under `id`, with this store recorded as
    /// an origin.
    pub fn get(&self, id: &LocalId) -> StoreResult<Record> {
        let mut record = self.accessor.get(id).map_err(|e| self.wrap("get", e))?;
        record.add_origin(self.id.as_str(), id.clone());
        Ok(record)
    }

    /// Returns the record matching `key`, with this store recorded as an
    /// origin.
    pub fn find(&self, key: &IdentityKey) -> StoreResult<StoredRecord> {
        let mut found = self.accessor.find(key).map_err(|e| self.wrap("find", e))?;
        found.record.add_origin(self.id.as_str(), found.id.clone());
        Ok(found)
    }

    /// Creates `record` and notifies subscribers.
    pub fn create(&self, record: &Record) -> StoreResult<Mutation> {
        let id = self
            .accessor
            .create(record)
            .map_err(|e| self.wrap("create", e))?;

        let mut stored = record.clone();
        stored.commit();
        stored.add_origin(self.id.as_str(), id.clone());

        debug!(store = %self.id, key = %record.identity_key(), id = %id, "record created");
        self.stats.write().creates += 1;

        let event = ChangeEvent::create(self.id.as_str(), stored.clone(), id.clone());
        Ok(Mutation {
            operation: Operation::Create,
            local_id: id,
            record: Some(stored),
            notices: self.notify(&event),
        })
    }

    /// Applies `changes` to the record under `id` and notifies
    /// subscribers.
    ///
    /// The updated record is read back for the notification. If that read
    /// fails, the error is returned, the update stays applied and no
    /// notification is sent.
    pub fn update(&self, id: &LocalId, changes: &FieldChanges) -> StoreResult<Mutation> {
        self.accessor
            .update(id, changes)
            .map_err(|e| self.wrap("update", e))?;
        self.stats.write().updates += 1;

        let record = self.get(id)?;
        debug!(
            store = %self.id,
            key = %record.identity_key(),
            id = %id,
            fields = changes.len(),
            "record updated"
        );

        let event = ChangeEvent::update(
            self.id.as_str(),
            record.clone(),
            id.clone(),
            changes.clone(),
        );
        Ok(Mutation {
            operation: Operation::Update,
            local_id: id.clone(),
            record: Some(record),
            notices: self.notify(&event),
        })
    }

    /// Deletes the record under `id` and notifies subscribers.
    ///
    /// The record is read before deletion so the event can carry it. If
    /// the identity is absent and the accessor accepts the delete anyway,
    /// the mutation has no record and nothing is notified.
    pub fn delete(&self, id: &LocalId) -> StoreResult<Mutation> {
        let before = match self.get(id) {
            Ok(record) => Some(record),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        self.accessor
            .delete(id)
            .map_err(|e| self.wrap("delete", e))?;

        let Some(mut record) = before else {
            debug!(store = %self.id, id = %id, "delete of absent record accepted");
            return Ok(Mutation {
                operation: Operation::Delete,
                local_id: id.clone(),
                record: None,
                notices: Vec::new(),
            });
        };

        record.remove_origin(&self.id);
        debug!(store = %self.id, key = %record.identity_key(), id = %id, "record deleted");
        self.stats.write().deletes += 1;

        let event = ChangeEvent::delete(self.id.as_str(), record.clone(), id.clone());
        Ok(Mutation {
            operation: Operation::Delete,
            local_id: id.clone(),
            record: Some(record),
            notices: self.notify(&event),
        })
    }

    /// Creates or updates `record` depending on whether this store
    /// already holds it.
    ///
    /// A record with an origin in this store is updated with its dirty
    /// fields; if that identity has vanished, or the record has no origin
    /// here, it is created. On success the record is committed and its
    /// origin for this store is set.
    pub fn save(&self, record: &mut Record) -> StoreResult<Mutation> {
        if let Some(id) = record.origin(&self.id).cloned() {
            match self.update(&id, &record.changes()) {
                Ok(mutation) => {
                    record.commit();
                    return Ok(mutation);
                }
                Err(err) if err.is_not_found() => {
                    record.remove_origin(&self.id);
                }
                Err(err) => return Err(err),
            }
        }

        let mutation = self.create(record)?;
        record.commit();
        record.add_origin(self.id.as_str(), mutation.local_id.clone());
        Ok(mutation)
    }

    /// Lists the local identities of every record of `type_name`.
    pub fn enumerate_identities(&self, type_name: &str) -> StoreResult<IdentityIter> {
        self.accessor
            .enumerate_identities(type_name)
            .map_err(|e| self.wrap("enumerate_identities", e))
    }

    /// Subscribes `subscriber` to change events.
    ///
    /// Subscriptions are per instance: distinct subscribers sharing an id
    /// are both notified. Returns false if this instance is already
    /// attached.
    pub fn attach(&self, subscriber: Arc<dyn ChangeSubscriber>) -> bool {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(Subscription::is_live);

        if subscribers.iter().any(|s| s.is(&*subscriber)) {
            return false;
        }

        debug!(store = %self.id, subscriber = subscriber.subscriber_id(), "subscriber attached");
        subscribers.push(Subscription {
            id: subscriber.subscriber_id().to_owned(),
            subscriber: Arc::downgrade(&subscriber),
        });
        true
    }

    /// Removes every subscriber with `subscriber_id`.
    ///
    /// Returns false if no such subscriber was attached.
    pub fn detach(&self, subscriber_id: &str) -> bool {
        self.remove_where(|s| s.id == subscriber_id)
    }

    /// Removes `subscriber`, leaving other subscribers with the same id
    /// attached.
    ///
    /// Returns false if it was not attached.
    pub fn unsubscribe(&self, subscriber: &dyn ChangeSubscriber) -> bool {
        self.remove_where(|s| s.is(subscriber))
    }

    fn remove_where(&self, matches: impl Fn(&Subscription) -> bool) -> bool {
        let mut subscribers = self.subscribers.write();
        let mut removed = false;
        subscribers.retain(|s| {
            if matches(s) {
                removed = true;
                return false;
            }
            s.is_live()
        });
        removed
    }

    /// Returns the ids of live subscribers, in subscription order.
    pub fn subscriber_ids(&self) -> Vec<String> {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.is_live())
            .map(|s| s.id.clone())
            .collect()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .iter()
            .filter(|s| s.is_live())
            .count()
    }

    /// Returns a snapshot of the store counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.read().clone()
    }

    fn notify(&self, event: &ChangeEvent) -> Vec<SubscriberNotice> {
        // Deliver outside the lock: subscribers may mutate this store.
        let live: Vec<(String, Arc<dyn ChangeSubscriber>)> = {
            let mut subscribers = self.subscribers.write();
            subscribers.retain(Subscription::is_live);
            subscribers
                .iter()
                .filter_map(|s| s.subscriber.upgrade().map(|sub| (s.id.clone(), sub)))
                .collect()
        };

        self.stats.write().events_emitted += 1;

        let mut notices = Vec::with_capacity(live.len());
        for (id, subscriber) in live {
            let outcome = subscriber.on_change(event);
            if let Err(err) = &outcome {
                warn!(store = %self.id, subscriber = %id, error = %err, "subscriber failed");
                self.stats.write().subscriber_failures += 1;
            }
            notices.push(SubscriberNotice {
                subscriber: id,
                outcome,
            });
        }
        notices
    }

    fn wrap(&self, operation: &'static str, err: AccessorError) -> StoreError {
        StoreError::from_accessor(&self.id, operation, err)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .field("subscribers", &self.subscriber_ids())
            .finish_non_exhaustive()
    }
}
