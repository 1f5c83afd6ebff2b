//! Test fixtures and topology helpers.
//!
//! Provides the record types used across the test suites and
//! convenience functions for wiring stores to a synchronizer.

use crossync_accessor::{Accessor, InMemoryAccessor};
use crossync_core::{Store, SyncConfig, Synchronizer};
use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
use std::sync::{Arc, OnceLock};

/// The `Server` record type: a required `ip`, a `port` defaulting to 22
/// and an optional `os`.
pub fn server_type() -> Arc<RecordType> {
    static SERVER: OnceLock<Arc<RecordType>> = OnceLock::new();
    SERVER
        .get_or_init(|| {
            RecordType::builder("Server")
                .field(
                    FieldDescriptor::new("ip", FieldType::String)
                        .required()
                        .with_description("Primary address"),
                )
                .field(FieldDescriptor::new("port", FieldType::Int).with_default(22))
                .field(FieldDescriptor::new("os", FieldType::String))
                .build()
                .expect("Server type is valid")
        })
        .clone()
}

/// The `Rack` record type: an optional `units` count.
pub fn rack_type() -> Arc<RecordType> {
    static RACK: OnceLock<Arc<RecordType>> = OnceLock::new();
    RACK.get_or_init(|| {
        RecordType::builder("Rack")
            .field(FieldDescriptor::new("units", FieldType::Int))
            .build()
            .expect("Rack type is valid")
    })
    .clone()
}

/// Builds a `Server` record.
pub fn server(name: &str, context: &str, ip: &str) -> Record {
    Record::new(name, context, server_type())
        .and_then(|r| r.with_field("ip", ip))
        .expect("Failed to build server record")
}

/// Builds a `Rack` record.
pub fn rack(name: &str, context: &str, units: i64) -> Record {
    Record::new(name, context, rack_type())
        .and_then(|r| r.with_field("units", units))
        .expect("Failed to build rack record")
}

/// Creates a store over a fresh in-memory accessor.
pub fn memory_store(id: &str) -> Arc<Store> {
    Arc::new(Store::new(id, InMemoryAccessor::new()))
}

/// Creates a store over `accessor`.
pub fn store_with(id: &str, accessor: impl Accessor + 'static) -> Arc<Store> {
    Arc::new(Store::new(id, accessor))
}

/// Counts the records of `type_name` held by `store`.
pub fn count(store: &Store, type_name: &str) -> usize {
    store
        .enumerate_identities(type_name)
        .expect("Failed to enumerate identities")
        .count()
}

/// Stores wired to one synchronizer.
pub struct TestTopology {
    /// The stores, in attachment order.
    pub stores: Vec<Arc<Store>>,
    /// The synchronizer connecting them.
    pub sync: Arc<Synchronizer>,
}

impl TestTopology {
    /// Creates one in-memory store per id and connects them.
    pub fn memory(ids: &[&str]) -> Self {
        Self::connect(ids.iter().map(|id| memory_store(id)).collect())
    }

    /// Connects `stores` with a default configuration.
    pub fn connect(stores: Vec<Arc<Store>>) -> Self {
        Self::with_config(SyncConfig::new("sync"), stores)
    }

    /// Connects `stores` with `config`.
    pub fn with_config(config: SyncConfig, stores: Vec<Arc<Store>>) -> Self {
        let sync = Synchronizer::connect(config, &stores);
        Self { stores, sync }
    }

    /// Returns the store with `id`.
    pub fn store(&self, id: &str) -> &Arc<Store> {
        self.stores
            .iter()
            .find(|s| s.id() == id)
            .expect("Store is part of the topology")
    }

    /// Returns true if every store holds the same `type_name` records
    /// with the same values.
    pub fn converged(&self, type_name: &str) -> bool {
        let Some((first, rest)) = self.stores.split_first() else {
            return true;
        };
        let reference = snapshot(first, type_name);
        rest.iter().all(|s| {
            let other = snapshot(s, type_name);
            other.len() == reference.len()
                && reference.iter().all(|r| other.iter().any(|o| o.same_values(r)))
        })
    }
}

fn snapshot(store: &Store, type_name: &str) -> Vec<Record> {
    store
        .enumerate_identities(type_name)
        .expect("Failed to enumerate identities")
        .map(|id| store.get(&id).expect("Enumerated record is readable"))
        .collect()
}

/// Runs a test against an in-memory topology.
///
/// # Example
///
/// ```rust
/// use crossync_testkit::{count, server, with_topology};
///
/// with_topology(&["a", "b"], |topology| {
///     topology.store("a").create(&server("host1", "dc1", "10.0.0.1")).unwrap();
///     assert_eq!(count(topology.store("b"), "Server"), 1);
/// });
/// ```
pub fn with_topology<F, R>(ids: &[&str], f: F) -> R
where
    F: FnOnce(&TestTopology) -> R,
{
    let topology = TestTopology::memory(ids);
    f(&topology)
}

/// Installs a test-writer tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
