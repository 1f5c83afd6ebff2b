//! Field descriptors and typed field values.

use crate::error::{RecordError, RecordResult};
use crate::identity::IdentityKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The value type a field is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// UTF-8 text.
    String,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
    /// UTC timestamp.
    Date,
    /// Reference to another record by identity key.
    Reference,
}

impl FieldType {
    /// Returns the lowercase type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Date => "date",
            FieldType::Reference => "reference",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value.
///
/// `Null` stands for "no value": it conforms to every field type and
/// resolves to the descriptor's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    /// No value.
    Null,
    /// Text value.
    String(String),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// Boolean value.
    Bool(bool),
    /// Timestamp value.
    Date(DateTime<Utc>),
    /// Reference to another record.
    Reference(IdentityKey),
}

impl FieldValue {
    /// Returns the type of this value, or `None` for `Null`.
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            FieldValue::Null => None,
            FieldValue::String(_) => Some(FieldType::String),
            FieldValue::Int(_) => Some(FieldType::Int),
            FieldValue::Float(_) => Some(FieldType::Float),
            FieldValue::Bool(_) => Some(FieldType::Bool),
            FieldValue::Date(_) => Some(FieldType::Date),
            FieldValue::Reference(_) => Some(FieldType::Reference),
        }
    }

    /// Returns true if this is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Returns true if this value may be stored in a field of type `ty`.
    pub fn conforms_to(&self, ty: FieldType) -> bool {
        self.field_type().map_or(true, |own| own == ty)
    }

    /// Returns the text value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer value, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float value, if any.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the boolean value, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the timestamp value, if any.
    pub fn as_date(&self) -> Option<&DateTime<Utc>> {
        match self {
            FieldValue::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the referenced identity key, if any.
    pub fn as_reference(&self) -> Option<&IdentityKey> {
        match self {
            FieldValue::Reference(key) => Some(key),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Date(value)
    }
}

impl From<IdentityKey> for FieldValue {
    fn from(value: IdentityKey) -> Self {
        FieldValue::Reference(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Schema declaration for one record field.
///
/// Descriptors are immutable once their record type is built and are
/// shared by every record of that type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    value_type: FieldType,
    default: FieldValue,
    required: bool,
    description: Option<String>,
    identifier: bool,
}

impl FieldDescriptor {
    /// Declares a field with a `Null` default.
    pub fn new(name: impl Into<String>, value_type: FieldType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default: FieldValue::Null,
            required: false,
            description: None,
            identifier: false,
        }
    }

    /// Sets the default value.
    ///
    /// The default is checked against the field type when the record
    /// type is built.
    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = default.into();
        self
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Flags the field as a natural identifier of the record.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    pub fn value_type(&self) -> FieldType {
        self.value_type
    }

    /// Returns the default value.
    pub fn default_value(&self) -> &FieldValue {
        &self.default
    }

    /// Returns true if the field must resolve to a non-null value.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns true if the field is flagged as an identifier.
    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    /// Checks that `value` may be stored in this field.
    pub fn check(&self, value: &FieldValue) -> RecordResult<()> {
        match value.field_type() {
            Some(found) if found != self.value_type => Err(RecordError::TypeMismatch {
                field: self.name.clone(),
                expected: self.value_type,
                found,
            }),
            _ => Ok(()),
        }
    }

    /// Resolves a stored value, falling back to the default when absent
    /// or null.
    pub fn resolve<'a>(&'a self, value: Option<&'a FieldValue>) -> &'a FieldValue {
        match value {
            Some(v) if !v.is_null() => v,
            _ => &self.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_conforms_to_every_type() {
        for ty in [
            FieldType::String,
            FieldType::Int,
            FieldType::Float,
            FieldType::Bool,
            FieldType::Date,
            FieldType::Reference,
        ] {
            assert!(FieldValue::Null.conforms_to(ty));
        }
        assert!(!FieldValue::Int(1).conforms_to(FieldType::Float));
    }

    #[test]
    fn check_rejects_wrong_type() {
        let desc = FieldDescriptor::new("ip", FieldType::String);
        assert!(desc.check(&"10.0.0.1".into()).is_ok());
        assert!(desc.check(&FieldValue::Null).is_ok());

        let err = desc.check(&FieldValue::Int(10)).unwrap_err();
        assert!(matches!(
            err,
            RecordError::TypeMismatch {
                expected: FieldType::String,
                found: FieldType::Int,
                ..
            }
        ));
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let desc = FieldDescriptor::new("port", FieldType::Int).with_default(22);
        assert_eq!(desc.resolve(None), &FieldValue::Int(22));
        assert_eq!(desc.resolve(Some(&FieldValue::Null)), &FieldValue::Int(22));
        assert_eq!(desc.resolve(Some(&FieldValue::Int(443))), &FieldValue::Int(443));
    }

    #[test]
    fn descriptor_metadata() {
        let desc = FieldDescriptor::new("serial", FieldType::String)
            .required()
            .identifier()
            .with_description("hardware serial number");
        assert!(desc.is_required());
        assert!(desc.is_identifier());
        assert_eq!(desc.description(), Some("hardware serial number"));
        assert_eq!(desc.default_value(), &FieldValue::Null);
    }

    #[test]
    fn option_into_value() {
        let some: FieldValue = Some("x").into();
        let none: FieldValue = Option::<&str>::None.into();
        assert_eq!(some, FieldValue::String("x".into()));
        assert!(none.is_null());
    }

    #[test]
    fn value_serde_shape() {
        let json = serde_json::to_string(&FieldValue::Int(7)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":7}"#);
        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FieldValue::Int(7));
    }
}
