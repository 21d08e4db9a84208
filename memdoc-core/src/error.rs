//! Error types and result types for document store operations.
//!
//! Every operation reports failure through its future's output as a
//! [`DocumentStoreError`]. Use [`DocumentStoreResult<T>`] as the return type for
//! fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when interacting with a document store.
///
/// Write paths only fail on records that cannot be stored (an identifier that has no
/// storage key). The only expected read-path failure is [`DocumentStoreError::DocumentNotFound`]
/// on a direct identifier lookup.
#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// Serialization/deserialization error when converting between record formats (BSON, JSON, typed).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The requested collection does not exist in the store.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    /// The record has an invalid structure or an identifier that cannot be used as a key.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// The query has a shape the matcher does not support.
    #[error("Malformed query: {0}")]
    MalformedQuery(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Returns `true` if this error reports a missing document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentStoreError::DocumentNotFound(..))
    }
}

/// A specialized `Result` type for document store operations.
pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<BsonError> for DocumentStoreError {
    fn from(err: BsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DocumentStoreError {
    fn from(err: SerdeJsonError) -> Self {
        DocumentStoreError::Serialization(err.to_string())
    }
}
