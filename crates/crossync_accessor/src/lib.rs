//! # crossync Accessor
//!
//! Accessor capability trait and reference implementation for crossync.
//!
//! An accessor is the only component that talks to a concrete backend.
//! It implements six primitives against one backend and knows nothing
//! about other stores; cross-store effects belong to the synchronizer.
//!
//! ## Primitives
//!
//! - `get` by local identity
//! - `find` by identity key
//! - `create`, `update`, `delete`
//! - `enumerate_identities` for bulk reconciliation
//!
//! ## Available Accessors
//!
//! - [`InMemoryAccessor`] - For testing and ephemeral stores

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod accessor;
mod error;
mod memory;

pub use accessor::{Accessor, IdentityIter, StoredRecord};
pub use error::{AccessorError, AccessorResult};
pub use memory::{DeletePolicy, InMemoryAccessor};
