//! # crossync Testkit
//!
//! Test utilities for crossync.
//!
//! This crate provides:
//! - Record type fixtures and wired store topologies
//! - Instrumented accessors that record or fail primitive calls
//! - Property-based test generators using proptest
//! - A test-writer tracing subscriber
//!
//! ## Usage
//!
//! ```rust
//! use crossync_accessor::InMemoryAccessor;
//! use crossync_testkit::prelude::*;
//!
//! let (accessor, log) = RecordingAccessor::new(InMemoryAccessor::new());
//! let topology = TestTopology::connect(vec![
//!     memory_store("a"),
//!     store_with("b", accessor),
//! ]);
//!
//! topology.store("a").create(&server("host1", "dc1", "10.0.0.1")).unwrap();
//! assert_eq!(log.count(Primitive::Create), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod accessors;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::accessors::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use accessors::*;
pub use fixtures::*;
pub use generators::*;
