//! # crossync Core
//!
//! Stores and synchronizers for crossync.
//!
//! This crate provides:
//! - [`Store`]: the single point of mutation for one accessor, emitting
//!   change events to its subscribers
//! - [`Synchronizer`]: a subscriber that replays each change into every
//!   other attached store, suppressing the echoes of its own writes
//! - Bulk reconciliation to repair drift left by failed replications
//! - Propagation reports and counters
//!
//! ## Example
//!
//! ```rust
//! use crossync_accessor::InMemoryAccessor;
//! use crossync_core::{ReplicationAction, Store, SyncConfig, Synchronizer};
//! use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
//! use std::sync::Arc;
//!
//! let server = RecordType::builder("Server")
//!     .field(FieldDescriptor::new("ip", FieldType::String).required())
//!     .build()
//!     .unwrap();
//!
//! let a = Arc::new(Store::new("a", InMemoryAccessor::new()));
//! let b = Arc::new(Store::new("b", InMemoryAccessor::new()));
//! let _sync = Synchronizer::connect(SyncConfig::new("s"), &[a.clone(), b.clone()]);
//!
//! let host = Record::new("host1", "dc1", server)
//!     .unwrap()
//!     .with_field("ip", "10.0.0.1")
//!     .unwrap();
//! let mutation = a.create(&host).unwrap();
//!
//! let report = mutation.reports().next().unwrap();
//! assert!(matches!(report.action("b"), Some(ReplicationAction::Created(_))));
//! assert_eq!(
//!     b.find(host.identity_key()).unwrap().record.get("ip").unwrap().as_str(),
//!     Some("10.0.0.1")
//! );
//! ```
//!
//! ## Concurrency
//!
//! Stores and synchronizers are `Send + Sync`. Events for distinct keys
//! may propagate concurrently from different threads; a second event for
//! a key already in flight in the same synchronizer is suppressed rather
//! than queued.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod event;
mod reconcile;
mod report;
mod store;
mod synchronizer;

pub use config::{SyncConfig, DEFAULT_RECONCILE_BATCH_SIZE};
pub use error::{StoreError, StoreResult, SubscriberError, SyncError, SyncResult};
pub use event::{ChangeEvent, Operation, OperationSet};
pub use report::{
    ChainId, PropagationReport, ReconcileFailure, ReconcileReport, ReplicationAction,
    TargetOutcome,
};
pub use store::{ChangeSubscriber, Delivery, Mutation, Store, StoreStats, SubscriberNotice};
pub use synchronizer::{ReportSink, SyncStats, Synchronizer};
