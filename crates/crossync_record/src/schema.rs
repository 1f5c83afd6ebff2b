//! Record types and the schema registry.

use crate::error::{RecordError, RecordResult};
use crate::field::{FieldDescriptor, FieldValue};
use std::collections::HashMap;
use std::sync::Arc;

/// A record type: a name plus its ordered field descriptors.
///
/// Built once through [`RecordType::builder`] and shared behind an `Arc`
/// by every record of the type.
#[derive(Debug)]
pub struct RecordType {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl RecordType {
    /// Starts declaring a record type.
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Returns the type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field descriptors in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up a field descriptor by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the descriptor for `name` after checking `value` against it.
    pub fn check_field(&self, name: &str, value: &FieldValue) -> RecordResult<&FieldDescriptor> {
        let desc = self.field(name).ok_or_else(|| RecordError::UnknownField {
            record_type: self.name.clone(),
            field: name.to_owned(),
        })?;
        desc.check(value)?;
        Ok(desc)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

/// Builder for [`RecordType`].
#[derive(Debug)]
pub struct RecordTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordTypeBuilder {
    /// Adds a field descriptor.
    pub fn field(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Validates the declaration and freezes it.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the type name is empty
    /// - `DuplicateField` if a field name repeats
    /// - `TypeMismatch` if a default does not match its field type
    pub fn build(self) -> RecordResult<Arc<RecordType>> {
        if self.name.is_empty() {
            return Err(RecordError::InvalidName {
                component: "type name",
                value: self.name,
            });
        }

        let mut index = HashMap::with_capacity(self.fields.len());
        for (i, desc) in self.fields.iter().enumerate() {
            if index.insert(desc.name().to_owned(), i).is_some() {
                return Err(RecordError::DuplicateField {
                    record_type: self.name,
                    field: desc.name().to_owned(),
                });
            }
            desc.check(desc.default_value())?;
        }

        Ok(Arc::new(RecordType {
            name: self.name,
            fields: self.fields,
            index,
        }))
    }
}

/// Registry of record types by name.
#[derive(Debug, Default, Clone)]
pub struct Schema {
    types: HashMap<String, Arc<RecordType>>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a record type.
    ///
    /// Registering the same definition twice is accepted; a different
    /// definition under a taken name is rejected.
    pub fn register(&mut self, record_type: Arc<RecordType>) -> RecordResult<()> {
        if let Some(existing) = self.types.get(record_type.name()) {
            if **existing == *record_type {
                return Ok(());
            }
            return Err(RecordError::DuplicateType(record_type.name().to_owned()));
        }
        self.types
            .insert(record_type.name().to_owned(), record_type);
        Ok(())
    }

    /// Returns the record type registered under `name`.
    pub fn get(&self, name: &str) -> RecordResult<Arc<RecordType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| RecordError::UnknownType(name.to_owned()))
    }

    /// Returns the registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldType;

    fn server() -> Arc<RecordType> {
        RecordType::builder("Server")
            .field(FieldDescriptor::new("ip", FieldType::String).required())
            .field(FieldDescriptor::new("port", FieldType::Int).with_default(22))
            .build()
            .unwrap()
    }

    #[test]
    fn build_keeps_declaration_order() {
        let ty = server();
        let names: Vec<_> = ty.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["ip", "port"]);
        assert_eq!(ty.field("port").unwrap().value_type(), FieldType::Int);
        assert!(ty.field("missing").is_none());
    }

    #[test]
    fn build_rejects_duplicate_field() {
        let err = RecordType::builder("Server")
            .field(FieldDescriptor::new("ip", FieldType::String))
            .field(FieldDescriptor::new("ip", FieldType::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, RecordError::DuplicateField { .. }));
    }

    #[test]
    fn build_rejects_mistyped_default() {
        let err = RecordType::builder("Server")
            .field(FieldDescriptor::new("port", FieldType::Int).with_default("22"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RecordError::TypeMismatch { .. }));
    }

    #[test]
    fn check_field_reports_unknown() {
        let ty = server();
        let err = ty.check_field("os", &"linux".into()).unwrap_err();
        assert!(matches!(err, RecordError::UnknownField { .. }));
    }

    #[test]
    fn schema_register_and_get() {
        let mut schema = Schema::new();
        schema.register(server()).unwrap();
        // identical definition is fine
        schema.register(server()).unwrap();
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("Server").unwrap().name(), "Server");
        assert!(matches!(
            schema.get("Switch"),
            Err(RecordError::UnknownType(_))
        ));

        let other = RecordType::builder("Server")
            .field(FieldDescriptor::new("hostname", FieldType::String))
            .build()
            .unwrap();
        assert!(matches!(
            schema.register(other),
            Err(RecordError::DuplicateType(_))
        ));
    }
}
