//! Records, identifiers, and typed documents.
//!
//! A [`Record`] is an ordered BSON document. Exactly one field, [`ID_FIELD`], carries its
//! identifier. Collections address records by the *storage key* of that identifier (see
//! [`storage_key`]), which lets numeric, string, ObjectId, and UUID identifiers share one
//! keyspace without altering the identifier value a caller reads back.
//!
//! Typed records are plain `serde` types implementing [`Document`]; [`DocumentExt`] converts
//! them to and from records.

use bson::{
    Bson, Document as BsonDocument, de::deserialize_from_bson, ser::serialize_to_bson,
    spec::BinarySubtype,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// A stored record: an ordered mapping of field names to BSON values.
pub type Record = BsonDocument;

/// The name of the identifier field carried by every stored record.
pub const ID_FIELD: &str = "id";

/// Returns the identifier of a record, treating an explicit `null` as absent.
pub fn record_id(record: &Record) -> Option<&Bson> {
    match record.get(ID_FIELD) {
        None | Some(Bson::Null) => None,
        Some(id) => Some(id),
    }
}

/// Coerces an identifier to the string key used by a collection's mapping.
///
/// | Identifier | Key |
/// |---|---|
/// | `String` | the string itself |
/// | `Int32`, `Int64` | decimal text |
/// | finite `Double` | shortest decimal text (`1.0` becomes `"1"`, `-0.0` becomes `"0"`) |
/// | `Boolean` | `"true"` / `"false"` |
/// | `ObjectId` | hex text |
/// | UUID `Binary` | hyphenated UUID text |
///
/// Identifiers that coerce to the same key address the same record.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] for any other value, including
/// documents, arrays, and non-finite doubles.
pub fn storage_key(id: &Bson) -> DocumentStoreResult<String> {
    match id {
        Bson::String(value) => Ok(value.clone()),
        Bson::Int32(value) => Ok(value.to_string()),
        Bson::Int64(value) => Ok(value.to_string()),
        // -0.0 equals 0, so both share the key "0".
        Bson::Double(value) if *value == 0.0 => Ok("0".to_string()),
        Bson::Double(value) if value.is_finite() => Ok(value.to_string()),
        Bson::Boolean(value) => Ok(value.to_string()),
        Bson::ObjectId(oid) => Ok(oid.to_hex()),
        Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid => Uuid::from_slice(&binary.bytes)
            .map(|uuid| uuid.to_string())
            .map_err(|e| DocumentStoreError::InvalidDocument(format!("invalid UUID identifier: {e}"))),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "identifier of type {:?} cannot be used as a key",
            other.element_type()
        ))),
    }
}

/// Shallow-merges `patch` over `current` for the record addressed by `id`.
///
/// Fields in `patch` overwrite same-named fields; every other field of `current` is kept.
/// The identifier is immutable: an existing `id` on `current` is kept, otherwise `id` is
/// assigned as the first field. An `id` inside `patch` is ignored.
pub fn merge_patch(current: Record, patch: Record, id: &Bson) -> Record {
    let mut merged = Record::new();
    if record_id(&current).is_none() {
        merged.insert(ID_FIELD, id.clone());
    }

    for (field, value) in current {
        if field == ID_FIELD && value == Bson::Null {
            continue;
        }
        merged.insert(field, value);
    }

    for (field, value) in patch {
        if field == ID_FIELD {
            if storage_key(&value).ok() != storage_key(id).ok() {
                warn!(addressed = %id, patched = %value, "ignoring identifier change in update patch");
            }
            continue;
        }
        merged.insert(field, value);
    }

    merged
}

/// Converts a JSON object into a record.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value is not a JSON object.
pub fn record_from_json(value: &Value) -> DocumentStoreResult<Record> {
    match serialize_to_bson(value)? {
        Bson::Document(record) => Ok(record),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, found {:?}",
            other.element_type()
        ))),
    }
}

/// Converts a record into a JSON object.
pub fn record_to_json(record: &Record) -> DocumentStoreResult<Value> {
    Ok(deserialize_from_bson(Bson::Document(record.clone()))?)
}

/// Core trait for typed records stored through a [`TypedCollection`](crate::collection::TypedCollection).
///
/// The identifier lives in the serialized `id` field. Leave it `None` (or skip it when
/// serializing) to have the store mint one on save.
///
/// # Example
///
/// ```ignore
/// use memdoc::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     pub id: Option<i64>,
///     pub name: String,
/// }
///
/// impl Document for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Document: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing record and JSON conversions for documents.
///
/// This trait is automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document to a record for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the type does not serialize to a document.
    fn to_record(&self) -> DocumentStoreResult<Record>;

    /// Creates a document from a record.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_record(record: Record) -> DocumentStoreResult<Self>;

    /// Converts this document to a JSON value.
    fn to_json(&self) -> DocumentStoreResult<Value>;

    /// Creates a document from a JSON value.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_record(&self) -> DocumentStoreResult<Record> {
        match serialize_to_bson(self)? {
            Bson::Document(record) => Ok(record),
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {:?}, expected a document",
                D::collection_name(),
                other.element_type()
            ))),
        }
    }

    fn from_record(record: Record) -> DocumentStoreResult<Self> {
        Ok(deserialize_from_bson(Bson::Document(record))?)
    }

    fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Ok(from_value(value)?)
    }
}
