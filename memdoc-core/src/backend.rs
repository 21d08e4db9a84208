//! Storage backend abstraction for the document store.
//!
//! The [`StoreBackend`] trait is the seam between the CRUD façade
//! ([`Collection`](crate::collection::Collection)) and a concrete store. A backend does the
//! work of each operation; the façade takes care of query parsing, typed conversion, and
//! deferred completion, so backends never need to defer anything themselves.
//!
//! # Examples
//!
//! ```ignore
//! use memdoc::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//! let saved = backend.save_document("users", doc! { "name": "Alice" }).await?;
//! ```

use async_trait::async_trait;
use bson::Bson;
use std::fmt::Debug;

use crate::{
    document::Record,
    error::DocumentStoreResult,
    projection::Projection,
    query::{FindOptions, Query},
};

/// The outcome of a save.
///
/// A record saved without an identifier is inserted under a freshly minted one and returned.
/// A record saved with an identifier replaces whatever was stored under it, and the outcome
/// carries the change count instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Saved<T = Record> {
    /// The record was inserted under a new identifier.
    Inserted(T),
    /// The record at an existing identifier was replaced; carries the change count.
    Replaced(u64),
}

impl<T> Saved<T> {
    /// Returns the inserted record, if this save minted an identifier.
    pub fn inserted(self) -> Option<T> {
        match self {
            Saved::Inserted(record) => Some(record),
            Saved::Replaced(_) => None,
        }
    }

    /// Number of records written.
    pub fn changes(&self) -> u64 {
        match self {
            Saved::Inserted(_) => 1,
            Saved::Replaced(count) => *count,
        }
    }

    /// Maps the inserted record, leaving a change count untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Saved<U> {
        match self {
            Saved::Inserted(record) => Saved::Inserted(f(record)),
            Saved::Replaced(count) => Saved::Replaced(count),
        }
    }

    /// Converts the inserted record, leaving a change count untouched.
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Saved<U>, E> {
        match self {
            Saved::Inserted(record) => f(record).map(Saved::Inserted),
            Saved::Replaced(count) => Ok(Saved::Replaced(count)),
        }
    }
}

/// Abstract interface for document storage backends.
///
/// # Thread Safety
///
/// Implementations must be thread-safe. An operation must observe and leave the store in a
/// consistent state as a whole: no other operation on the same store may interleave with it.
///
/// # Identity
///
/// Records are addressed by the storage key of their `id` field
/// ([`storage_key`](crate::document::storage_key)). Identifiers are immutable once assigned.
///
/// # Error Handling
///
/// Write operations fail only on records whose identifier has no storage key. Reads never
/// fail on a missing collection; it simply holds no records.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Mints a fresh identifier. Never returns the same value twice for one store.
    async fn next_id(&self) -> DocumentStoreResult<Bson>;

    /// Allocates an empty collection if none exists under `name`.
    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Drops a collection and all its records.
    ///
    /// Returns [`CollectionNotFound`](crate::error::DocumentStoreError::CollectionNotFound)
    /// if there is no collection under `name`.
    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()>;

    /// Lists the names of all allocated collections.
    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>>;

    /// Saves a record, minting an identifier if it has none.
    ///
    /// With an identifier the stored record is fully replaced, not merged.
    async fn save_document(&self, collection: &str, record: Record) -> DocumentStoreResult<Saved>;

    /// Shallow-merges `patch` over the record at `id` (an empty record if absent) and stores
    /// the result under `id`.
    async fn update_document(&self, collection: &str, id: Bson, patch: Record) -> DocumentStoreResult<Saved>;

    /// Looks a record up by identifier, returning a copy.
    async fn get_document(&self, collection: &str, id: &Bson) -> DocumentStoreResult<Option<Record>>;

    /// Returns copies of every record matching `query`, in collection order unless `options`
    /// sort them, narrowed by `projection`.
    async fn find_documents(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Record>>;

    /// Returns a copy of the first record matching `query`, narrowed by `projection`.
    async fn find_one_document(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
        options: &FindOptions,
    ) -> DocumentStoreResult<Option<Record>>;

    /// Counts the records matching `query`.
    async fn count_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<u64>;

    /// Removes every record matching `query` and returns how many were removed.
    async fn delete_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<u64>;

    /// Flushes pending writes. Backends without buffering succeed immediately.
    async fn sync(&self) -> DocumentStoreResult<()> {
        Ok(())
    }

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
