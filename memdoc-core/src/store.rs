//! Main document store interface.
//!
//! A [`DocumentStore`] owns a backend and hands out collection handles:
//!
//! - [`DocumentStore::collection`] - an untyped [`Collection`] handle, created lazily
//! - [`DocumentStore::get_collection`] - same handle, but the collection is allocated first
//! - [`DocumentStore::typed_collection`] - a [`TypedCollection`] named by the document type
//!
//! # Example
//!
//! ```ignore
//! use memdoc::store::DocumentStore;
//!
//! let store = DocumentStore::new(backend);
//! let users = store.get_collection("users").await?;
//! ```

use bson::Bson;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    collection::{Collection, TypedCollection},
    completion::complete,
    document::Document,
    error::DocumentStoreResult,
};

/// A document store bound to a specific backend implementation.
///
/// Two handles on the same collection name always observe the same records.
#[derive(Debug)]
pub struct DocumentStore<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> DocumentStore<B> {
    /// Creates a new document store with the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend of this store.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gets a typed collection for the specified document type.
    ///
    /// The collection name is determined by the document type's `collection_name()` method.
    pub fn typed_collection<'a, D: Document>(&'a self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(D::collection_name().to_string(), &self.backend)
    }

    /// Gets an untyped collection handle with the given name.
    ///
    /// The collection is allocated by its first write; until then it reads as empty.
    pub fn collection<'a>(&'a self, name: &str) -> Collection<'a, B> {
        Collection::new(name.to_string(), &self.backend)
    }

    /// Allocates the named collection if absent and returns a handle to it.
    ///
    /// Asking for the same name again returns a handle on the same records.
    pub async fn get_collection<'a>(&'a self, name: &str) -> DocumentStoreResult<Collection<'a, B>> {
        let result = self
            .backend
            .create_collection(name)
            .await
            .map(|()| self.collection(name));

        complete(result).await
    }

    /// Allocates an empty collection if none exists under `name`.
    pub async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        complete(self.backend.create_collection(name).await).await
    }

    /// Drops a collection and every record in it.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionNotFound`](crate::error::DocumentStoreError::CollectionNotFound) if
    /// the collection does not exist.
    pub async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        complete(self.backend.drop_collection(name).await).await
    }

    /// Lists the names of all allocated collections, in allocation order.
    pub async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        complete(self.backend.list_collections().await).await
    }

    /// Mints a fresh identifier, unique within this store.
    pub async fn next_id(&self) -> DocumentStoreResult<Bson> {
        complete(self.backend.next_id().await).await
    }

    /// Flushes the backend.
    pub async fn sync(&self) -> DocumentStoreResult<()> {
        complete(self.backend.sync().await).await
    }

    /// Closes the store, releasing this handle on the backend.
    ///
    /// Other handles on a shared backend keep working.
    pub async fn close(self) -> DocumentStoreResult<()> {
        debug!("closing document store");
        complete(self.backend.shutdown().await).await
    }
}
