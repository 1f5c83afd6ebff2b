//! Error types for the record model.

use crate::field::FieldType;
use thiserror::Error;

/// Result type for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised while declaring record types or building records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A name or type name is empty.
    #[error("invalid {component} {value:?}")]
    InvalidName {
        /// Which identity component was rejected.
        component: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The field is not declared by the record type.
    #[error("record type {record_type} has no field {field}")]
    UnknownField {
        /// Record type name.
        record_type: String,
        /// Offending field name.
        field: String,
    },

    /// A value does not match the declared field type.
    #[error("field {field} expects {expected}, got {found}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Type of the supplied value.
        found: FieldType,
    },

    /// A required field resolved to null.
    #[error("record type {record_type} requires field {field}")]
    MissingRequired {
        /// Record type name.
        record_type: String,
        /// Missing field name.
        field: String,
    },

    /// A field was declared twice on one record type.
    #[error("record type {record_type} declares field {field} twice")]
    DuplicateField {
        /// Record type name.
        record_type: String,
        /// Duplicated field name.
        field: String,
    },

    /// A record type with this name is already registered.
    #[error("record type {0} is already registered")]
    DuplicateType(String),

    /// No record type with this name is registered.
    #[error("unknown record type {0}")]
    UnknownType(String),

    /// A composite identity key could not be parsed.
    #[error("malformed identity key {0:?}")]
    MalformedKey(String),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RecordError::TypeMismatch {
            field: "ip".into(),
            expected: FieldType::String,
            found: FieldType::Int,
        };
        assert_eq!(err.to_string(), "field ip expects string, got int");

        let err = RecordError::UnknownType("Server".into());
        assert_eq!(err.to_string(), "unknown record type Server");
    }
}
