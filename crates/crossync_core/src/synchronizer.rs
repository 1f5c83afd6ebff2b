//! Cross-store propagation.

use crate::config::SyncConfig;
use crate::error::{StoreResult, SubscriberError, SyncError, SyncResult};
use crate::event::{ChangeEvent, Operation};
use crate::report::{ChainId, PropagationReport, ReplicationAction, TargetOutcome};
use crate::store::{ChangeSubscriber, Delivery, Store, SubscriberNotice};
use crossync_record::{IdentityKey, Record};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, trace, warn};

/// Callback invoked with every finished propagation report.
pub type ReportSink = Box<dyn Fn(&PropagationReport) + Send + Sync>;

/// Counters for one synchronizer.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Propagation chains run to completion.
    pub chains_completed: u64,
    /// Events rejected because their key was already in flight.
    pub chains_suppressed: u64,
    /// Successful per-target replications.
    pub replications_succeeded: u64,
    /// Failed per-target replications.
    pub replications_failed: u64,
    /// Message of the most recent replication failure.
    pub last_error: Option<String>,
}

/// Keeps a set of stores consistent.
///
/// A synchronizer subscribes to every attached store. When one of them
/// reports a change, the synchronizer replays it into every other store:
///
/// | Operation | Key found in target | Key absent in target |
/// |-----------|---------------------|----------------------|
/// | create    | nothing             | create               |
/// | update    | update              | create               |
/// | delete    | delete              | nothing              |
///
/// Replicated writes notify the target's subscribers, this synchronizer
/// included. Such re-entrant events are suppressed while their key is in
/// flight, which stops replication loops; other synchronizers attached to
/// the target propagate them further.
///
/// Records are matched across stores by identity key only. Two distinct
/// entities sharing name, context and type are treated as one.
///
/// # Example
///
/// ```rust
/// use crossync_accessor::InMemoryAccessor;
/// use crossync_core::{Store, SyncConfig, Synchronizer};
/// use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
/// use std::sync::Arc;
///
/// let server = RecordType::builder("Server")
///     .field(FieldDescriptor::new("ip", FieldType::String))
///     .build()
///     .unwrap();
/// let cmdb = Arc::new(Store::new("cmdb", InMemoryAccessor::new()));
/// let tracker = Arc::new(Store::new("tracker", InMemoryAccessor::new()));
///
/// let sync = Synchronizer::connect(SyncConfig::new("main"), &[cmdb.clone(), tracker.clone()]);
///
/// let record = Record::new("host1", "dc1", server).unwrap();
/// cmdb.create(&record).unwrap();
/// assert!(tracker.find(record.identity_key()).is_ok());
/// assert_eq!(sync.in_flight_len(), 0);
/// ```
pub struct Synchronizer {
    config: SyncConfig,
    stores: RwLock<Vec<Arc<Store>>>,
    in_flight: Mutex<HashSet<IdentityKey>>,
    stats: RwLock<SyncStats>,
    report_sink: Option<ReportSink>,
}

/// Removes a key from the in-flight set when dropped, so the key is
/// released on every exit path.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<IdentityKey>>,
    key: IdentityKey,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

impl Synchronizer {
    /// Creates a synchronizer with no stores.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            stores: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            stats: RwLock::new(SyncStats::default()),
            report_sink: None,
        }
    }

    /// Creates a synchronizer and attaches `stores` in order.
    pub fn connect(config: SyncConfig, stores: &[Arc<Store>]) -> Arc<Self> {
        let sync = Arc::new(Self::new(config));
        for store in stores {
            sync.attach(store);
        }
        sync
    }

    /// Sets a callback receiving every propagation report.
    ///
    /// The callback runs after the chain's key has left the in-flight set.
    #[must_use]
    pub fn with_report_sink(
        mut self,
        sink: impl Fn(&PropagationReport) + Send + Sync + 'static,
    ) -> Self {
        self.report_sink = Some(Box::new(sink));
        self
    }

    /// Returns the synchronizer id.
    pub fn id(&self) -> &str {
        &self.config.id
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Attaches `store` and subscribes to its changes.
    ///
    /// Returns false if a store with the same id is already attached or
    /// the store already holds this subscription.
    pub fn attach(self: &Arc<Self>, store: &Arc<Store>) -> bool {
        {
            let mut stores = self.stores.write();
            if stores.iter().any(|s| s.id() == store.id()) {
                return false;
            }
            stores.push(Arc::clone(store));
        }

        if !store.attach(Arc::clone(self) as Arc<dyn ChangeSubscriber>) {
            self.stores.write().retain(|s| !Arc::ptr_eq(s, store));
            return false;
        }
        debug!(synchronizer = %self.config.id, store = store.id(), "store attached");
        true
    }

    /// Detaches the store with `store_id` and unsubscribes from it.
    ///
    /// Returns false if no such store was attached.
    pub fn detach(&self, store_id: &str) -> bool {
        let removed = {
            let mut stores = self.stores.write();
            let pos = stores.iter().position(|s| s.id() == store_id);
            pos.map(|pos| stores.remove(pos))
        };

        match removed {
            Some(store) => {
                store.unsubscribe(self);
                debug!(synchronizer = %self.config.id, store = store_id, "store detached");
                true
            }
            None => false,
        }
    }

    /// Returns the attached stores, in attachment order.
    pub fn stores(&self) -> Vec<Arc<Store>> {
        self.stores.read().clone()
    }

    /// Returns the attached store with `store_id`.
    pub fn store(&self, store_id: &str) -> Option<Arc<Store>> {
        self.stores
            .read()
            .iter()
            .find(|s| s.id() == store_id)
            .cloned()
    }

    /// Returns the number of keys currently being propagated.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Returns true if `key` is currently being propagated.
    pub fn is_in_flight(&self, key: &IdentityKey) -> bool {
        self.in_flight.lock().contains(key)
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Replays `event` into every attached store except its source.
    ///
    /// Targets are processed in attachment order. Each target's failure is
    /// recorded in the report and does not stop the others.
    ///
    /// # Errors
    ///
    /// - `UnknownStore` if the event's store is not attached
    /// - `LoopSuppressed` if the event's key is already in flight
    pub fn propagate(&self, event: &ChangeEvent) -> SyncResult<PropagationReport> {
        let key = event.identity_key();

        let targets: Vec<Arc<Store>> = {
            let stores = self.stores.read();
            if !stores.iter().any(|s| s.id() == event.store_id) {
                return Err(SyncError::UnknownStore(event.store_id.clone()));
            }
            stores
                .iter()
                .filter(|s| s.id() != event.store_id)
                .cloned()
                .collect()
        };

        let Some(guard) = self.enter(key) else {
            trace!(
                synchronizer = %self.config.id,
                key = %key,
                source = %event.store_id,
                "propagation suppressed"
            );
            self.stats.write().chains_suppressed += 1;
            return Err(SyncError::LoopSuppressed { key: key.clone() });
        };

        let chain = ChainId::new();
        let span = debug_span!(
            "propagate",
            synchronizer = %self.config.id,
            chain = %chain,
            key = %key,
            source = %event.store_id,
            operation = %event.operation,
        );
        let entered = span.enter();

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let (result, downstream) = match self.replicate(&target, event) {
                Ok((action, notices)) => {
                    debug!(store = target.id(), ?action, "replicated");
                    (Ok(action), notices)
                }
                Err(err) => {
                    warn!(store = target.id(), error = %err, "replication failed");
                    (Err(err), Vec::new())
                }
            };
            outcomes.push(TargetOutcome {
                store: target.id().to_owned(),
                result,
                downstream,
            });
        }

        drop(entered);
        drop(guard);

        let report = PropagationReport {
            chain,
            key: key.clone(),
            source: event.store_id.clone(),
            operation: event.operation,
            outcomes,
        };
        self.record(&report);

        if let Some(sink) = &self.report_sink {
            sink(&report);
        }
        Ok(report)
    }

    fn enter(&self, key: &IdentityKey) -> Option<InFlight<'_>> {
        let mut set = self.in_flight.lock();
        if !set.insert(key.clone()) {
            return None;
        }
        Some(InFlight {
            set: &self.in_flight,
            key: key.clone(),
        })
    }

    fn replicate(
        &self,
        target: &Store,
        event: &ChangeEvent,
    ) -> StoreResult<(ReplicationAction, Vec<SubscriberNotice>)> {
        let existing = match target.find(event.identity_key()) {
            Ok(found) => Some(found.id),
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(err),
        };

        match (event.operation, existing) {
            (Operation::Create, Some(id)) => Ok((ReplicationAction::AlreadyPresent(id), Vec::new())),
            (Operation::Create | Operation::Update, None) => {
                Self::create_replica(target, &event.record)
            }
            (Operation::Update, Some(id)) => match target.update(&id, &event.changes) {
                Ok(mutation) => Ok((ReplicationAction::Updated(id), mutation.notices)),
                // removed between find and update
                Err(err) if err.is_not_found() => Self::create_replica(target, &event.record),
                Err(err) => Err(err),
            },
            (Operation::Delete, Some(id)) => match target.delete(&id) {
                Ok(mutation) => Ok((ReplicationAction::Deleted(id), mutation.notices)),
                Err(err) if err.is_not_found() => Ok((ReplicationAction::Absent, Vec::new())),
                Err(err) => Err(err),
            },
            (Operation::Delete, None) => Ok((ReplicationAction::Absent, Vec::new())),
        }
    }

    fn create_replica(
        target: &Store,
        record: &Record,
    ) -> StoreResult<(ReplicationAction, Vec<SubscriberNotice>)> {
        match target.create(record) {
            Ok(mutation) => Ok((ReplicationAction::Created(mutation.local_id), mutation.notices)),
            // created concurrently since the find
            Err(err) if err.is_conflict() => match target.find(record.identity_key()) {
                Ok(found) => Ok((ReplicationAction::AlreadyPresent(found.id), Vec::new())),
                Err(_) => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn record(&self, report: &PropagationReport) {
        let mut stats = self.stats.write();
        stats.chains_completed += 1;
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(_) => stats.replications_succeeded += 1,
                Err(err) => {
                    stats.replications_failed += 1;
                    stats.last_error = Some(err.to_string());
                }
            }
        }
    }
}

impl ChangeSubscriber for Synchronizer {
    fn subscriber_id(&self) -> &str {
        &self.config.id
    }

    fn on_change(&self, event: &ChangeEvent) -> Result<Delivery, SubscriberError> {
        if !self.config.operations.includes(event.operation) {
            trace!(
                synchronizer = %self.config.id,
                operation = %event.operation,
                "operation not replicated"
            );
            return Ok(Delivery::Acknowledged);
        }

        match self.propagate(event) {
            Ok(report) => Ok(Delivery::Propagated(report)),
            Err(SyncError::LoopSuppressed { .. }) => Ok(Delivery::Suppressed),
            Err(err) => Err(SubscriberError::new(&self.config.id, err.to_string())),
        }
    }
}

impl fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stores: Vec<String> = self.stores.read().iter().map(|s| s.id().to_owned()).collect();
        f.debug_struct("Synchronizer")
            .field("config", &self.config)
            .field("stores", &stores)
            .field("in_flight", &self.in_flight_len())
            .finish_non_exhaustive()
    }
}
