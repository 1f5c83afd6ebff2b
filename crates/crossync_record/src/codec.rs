//! CBOR encoding of records for byte-oriented backends.
//!
//! Only the identity key and the explicitly set field values are
//! encoded. Origins are store-local and dirty-tracking state is
//! transient, so neither is written.

use crate::error::{RecordError, RecordResult};
use crate::field::FieldValue;
use crate::identity::IdentityKey;
use crate::record::Record;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize)]
struct Envelope {
    key: IdentityKey,
    fields: BTreeMap<String, FieldValue>,
}

/// Encodes a record to CBOR bytes.
pub fn encode_record(record: &Record) -> RecordResult<Vec<u8>> {
    let envelope = Envelope {
        key: record.identity_key().clone(),
        fields: record
            .values()
            .filter(|(_, value)| !value.is_null())
            .map(|(field, value)| (field.to_owned(), value.clone()))
            .collect(),
    };

    let mut buf = Vec::new();
    ciborium::ser::into_writer(&envelope, &mut buf)
        .map_err(|e| RecordError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes a record from CBOR bytes, resolving its type in `schema`.
///
/// Every decoded field is checked against the registered descriptor.
pub fn decode_record(bytes: &[u8], schema: &Schema) -> RecordResult<Record> {
    let envelope: Envelope =
        ciborium::de::from_reader(bytes).map_err(|e| RecordError::Codec(e.to_string()))?;

    let record_type = schema.get(envelope.key.type_name())?;
    let mut record = Record::new(
        envelope.key.name(),
        envelope.key.context_name(),
        record_type,
    )?;
    for (field, value) in envelope.fields {
        record = record.with_field(field, value)?;
    }
    Ok(record)
}
