//! Collection handles: the CRUD façade of the document store.
//!
//! - [`Collection`] - untyped collection working with BSON [`Record`]s
//! - [`TypedCollection`] - collection of a specific [`Document`] type
//!
//! Every operation does its work through the store backend and then completes through
//! [`complete`], so no operation ever resolves on its first poll. Failures, including
//! malformed queries, are reported through the returned future's output.
//!
//! # Example
//!
//! ```ignore
//! use bson::doc;
//!
//! let users = store.collection("users");
//! let alice = users.save(doc! { "name": "Alice" }).await?.inserted().unwrap();
//! let found = users.find(doc! { "name": "Alice" }).await?;
//! assert_eq!(found, vec![alice]);
//! ```

use bson::Bson;
use std::marker::PhantomData;

use crate::{
    backend::{Saved, StoreBackend},
    completion::complete,
    document::{Document, DocumentExt, Record, storage_key},
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
    query::{FindOptions, IntoQuery, Query},
};

/// An untyped collection with a reference to a storage backend.
///
/// Handles are cheap; two handles with the same name address the same records.
#[derive(Debug)]
pub struct Collection<'a, B: StoreBackend> {
    name: String,
    backend: &'a B,
}

impl<'a, B: StoreBackend> Collection<'a, B> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self { name, backend }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Saves a record.
    ///
    /// A record without an identifier gets one minted by the store and is returned as
    /// [`Saved::Inserted`]. A record with an identifier fully replaces the record stored
    /// under it (fields missing from `record` are not kept) and yields `Saved::Replaced(1)`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] if the identifier cannot be used as a key.
    pub async fn save(&self, record: Record) -> DocumentStoreResult<Saved> {
        self.save_with(record, Projection::all()).await
    }

    /// Saves a record, narrowing an inserted record by `projection`.
    ///
    /// A replacement outcome carries no record, so the projection does not apply to it.
    pub async fn save_with(&self, record: Record, projection: impl Into<Projection>) -> DocumentStoreResult<Saved> {
        let projection = projection.into();
        let result = self
            .backend
            .save_document(&self.name, record)
            .await
            .map(|saved| saved.map(|record| projection.apply(&record)));

        complete(result).await
    }

    /// Shallow-merges `patch` over the record at `id` and saves the result.
    ///
    /// A missing record is treated as empty, so this also creates records. Fields absent from
    /// `patch` are preserved; the identifier never changes.
    pub async fn update(&self, id: impl Into<Bson>, patch: Record) -> DocumentStoreResult<Saved> {
        self.update_with(id, patch, Projection::all()).await
    }

    /// Merges `patch` into the record at `id`, narrowing a returned record by `projection`.
    ///
    /// An update on an identifier always yields `Saved::Replaced(1)`, which the projection
    /// leaves unchanged.
    pub async fn update_with(
        &self,
        id: impl Into<Bson>,
        patch: Record,
        projection: impl Into<Projection>,
    ) -> DocumentStoreResult<Saved> {
        let projection = projection.into();
        let result = self
            .backend
            .update_document(&self.name, id.into(), patch)
            .await
            .map(|saved| saved.map(|record| projection.apply(&record)));

        complete(result).await
    }

    /// Retrieves the record with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentNotFound`] if no record has that identifier.
    pub async fn get(&self, id: impl Into<Bson>) -> DocumentStoreResult<Record> {
        self.get_with(id, Projection::all()).await
    }

    /// Retrieves the record with the given identifier, narrowed by `projection`.
    pub async fn get_with(&self, id: impl Into<Bson>, projection: impl Into<Projection>) -> DocumentStoreResult<Record> {
        let id = id.into();
        let result = match self.backend.get_document(&self.name, &id).await {
            Ok(Some(record)) => Ok(projection.into().apply(&record)),
            Ok(None) => Err(DocumentStoreError::DocumentNotFound(
                storage_key(&id).unwrap_or_else(|_| id.to_string()),
                self.name.clone(),
            )),
            Err(e) => Err(e),
        };

        complete(result).await
    }

    /// Finds every record matching `query`, in collection order.
    pub async fn find(&self, query: impl IntoQuery) -> DocumentStoreResult<Vec<Record>> {
        self.find_with(query, Projection::all(), FindOptions::default()).await
    }

    /// Finds every record matching `query`, narrowed by `projection` and arranged by `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::MalformedQuery`] if the query cannot be parsed.
    pub async fn find_with(
        &self,
        query: impl IntoQuery,
        projection: impl Into<Projection>,
        options: FindOptions,
    ) -> DocumentStoreResult<Vec<Record>> {
        let projection = projection.into();
        let result = match query.into_query() {
            Ok(query) => {
                self.backend
                    .find_documents(&self.name, &query, &projection, &options)
                    .await
            }
            Err(e) => Err(e),
        };

        complete(result).await
    }

    /// Finds the first record matching `query`, or `None`.
    ///
    /// Unlike [`Collection::get`], finding nothing is not an error.
    pub async fn find_one(&self, query: impl IntoQuery) -> DocumentStoreResult<Option<Record>> {
        self.find_one_with(query, Projection::all(), FindOptions::default()).await
    }

    /// Finds the first record matching `query`, narrowed by `projection` and arranged by
    /// `options`.
    pub async fn find_one_with(
        &self,
        query: impl IntoQuery,
        projection: impl Into<Projection>,
        options: FindOptions,
    ) -> DocumentStoreResult<Option<Record>> {
        let projection = projection.into();
        let result = match query.into_query() {
            Ok(query) => {
                self.backend
                    .find_one_document(&self.name, &query, &projection, &options)
                    .await
            }
            Err(e) => Err(e),
        };

        complete(result).await
    }

    /// Counts the records matching `query`.
    pub async fn count(&self, query: impl IntoQuery) -> DocumentStoreResult<u64> {
        let result = match query.into_query() {
            Ok(query) => self.backend.count_documents(&self.name, &query).await,
            Err(e) => Err(e),
        };

        complete(result).await
    }

    /// Deletes the records matching `query` and returns how many were removed.
    ///
    /// An identifier query removes at most one record. Matching nothing removes `0`.
    pub async fn delete(&self, query: impl IntoQuery) -> DocumentStoreResult<u64> {
        let result = match query.into_query() {
            Ok(query) => self.backend.delete_documents(&self.name, &query).await,
            Err(e) => Err(e),
        };

        complete(result).await
    }

    /// Deletes the record with the given identifier and returns how many were removed
    /// (`0` or `1`).
    pub async fn destroy(&self, id: impl Into<Bson>) -> DocumentStoreResult<u64> {
        complete(
            self.backend
                .delete_documents(&self.name, &Query::Id(id.into()))
                .await,
        )
        .await
    }

    /// Flushes the backend. Always succeeds for the in-memory backend.
    pub async fn sync(&self) -> DocumentStoreResult<()> {
        complete(self.backend.sync().await).await
    }

    /// Returns a typed view of this collection.
    pub fn with_type<D: Document>(&self) -> TypedCollection<'a, B, D> {
        TypedCollection::new(self.name.clone(), self.backend)
    }
}

/// A collection of a specific [`Document`] type.
///
/// Records are converted at the boundary with [`DocumentExt`]; all semantics are those of
/// [`Collection`].
#[derive(Debug)]
pub struct TypedCollection<'a, B: StoreBackend, D: Document> {
    inner: Collection<'a, B>,
    _marker: PhantomData<D>,
}

impl<'a, B: StoreBackend, D: Document> TypedCollection<'a, B, D> {
    pub(crate) fn new(name: String, backend: &'a B) -> Self {
        Self {
            inner: Collection::new(name, backend),
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Returns the untyped view of this collection.
    pub fn untyped(&self) -> &Collection<'a, B> {
        &self.inner
    }

    /// Converts this typed collection to a different document type.
    pub fn with_type<T: Document>(&self) -> TypedCollection<'a, B, T> {
        self.inner.with_type()
    }

    /// Saves a document. See [`Collection::save`].
    pub async fn save(&self, document: &D) -> DocumentStoreResult<Saved<D>> {
        let record = match document.to_record() {
            Ok(record) => record,
            Err(e) => return complete(Err(e)).await,
        };

        self.inner.save(record).await?.try_map(D::from_record)
    }

    /// Merges `patch` into the document at `id`. See [`Collection::update`].
    pub async fn update(&self, id: impl Into<Bson>, patch: Record) -> DocumentStoreResult<Saved<D>> {
        self.inner.update(id, patch).await?.try_map(D::from_record)
    }

    /// Retrieves the document with the given identifier. See [`Collection::get`].
    pub async fn get(&self, id: impl Into<Bson>) -> DocumentStoreResult<D> {
        D::from_record(self.inner.get(id).await?)
    }

    /// Finds every document matching `query`.
    pub async fn find(&self, query: impl IntoQuery) -> DocumentStoreResult<Vec<D>> {
        self.find_with(query, FindOptions::default()).await
    }

    /// Finds every document matching `query`, arranged by `options`.
    pub async fn find_with(&self, query: impl IntoQuery, options: FindOptions) -> DocumentStoreResult<Vec<D>> {
        self.inner
            .find_with(query, Projection::all(), options)
            .await?
            .into_iter()
            .map(D::from_record)
            .collect()
    }

    /// Finds the first document matching `query`, or `None`.
    pub async fn find_one(&self, query: impl IntoQuery) -> DocumentStoreResult<Option<D>> {
        self.inner
            .find_one(query)
            .await?
            .map(D::from_record)
            .transpose()
    }

    /// Counts the documents matching `query`.
    pub async fn count(&self, query: impl IntoQuery) -> DocumentStoreResult<u64> {
        self.inner.count(query).await
    }

    /// Deletes the documents matching `query`. See [`Collection::delete`].
    pub async fn delete(&self, query: impl IntoQuery) -> DocumentStoreResult<u64> {
        self.inner.delete(query).await
    }

    /// Deletes the document with the given identifier. See [`Collection::destroy`].
    pub async fn destroy(&self, id: impl Into<Bson>) -> DocumentStoreResult<u64> {
        self.inner.destroy(id).await
    }
}
