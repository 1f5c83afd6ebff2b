//! # crossync Record
//!
//! Record model for crossync.
//!
//! This crate provides:
//! - Field descriptors and typed field values
//! - Record types and a schema registry
//! - Records with provenance and dirty tracking
//! - Cross-store identity keys
//! - CBOR record encoding for byte-oriented backends
//!
//! ## Identity
//!
//! Stores do not share primary keys. A record is matched across stores
//! by its `(name, context, type)` [`IdentityKey`] only. Two distinct
//! real-world entities of the same type, in the same context, with the
//! same name, cannot be told apart.
//!
//! ## Example
//!
//! ```rust
//! use crossync_record::{FieldDescriptor, FieldType, Record, RecordType};
//!
//! let server = RecordType::builder("Server")
//!     .field(FieldDescriptor::new("ip", FieldType::String).required())
//!     .build()
//!     .unwrap();
//!
//! let record = Record::new("host1", "dc1", server)
//!     .unwrap()
//!     .with_field("ip", "10.0.0.1")
//!     .unwrap();
//! assert_eq!(record.identity_key().to_string(), "Server:dc1/host1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod field;
mod identity;
mod record;
mod schema;

pub use codec::{decode_record, encode_record};
pub use error::{RecordError, RecordResult};
pub use field::{FieldDescriptor, FieldType, FieldValue};
pub use identity::{IdentityKey, KEY_ESCAPE, KEY_SEPARATOR};
pub use record::{FieldChanges, LocalId, Record};
pub use schema::{RecordType, RecordTypeBuilder, Schema};
