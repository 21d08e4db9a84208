//! In-memory storage implementation for document stores.
//!
//! This module provides an in-memory backend that keeps records as BSON documents in
//! insertion-ordered maps behind a single async-aware read-write lock.

use std::sync::Arc;

use async_trait::async_trait;
use bson::Bson;
use indexmap::IndexMap;
use mea::rwlock::RwLock;
use serde::Deserialize;
use tracing::{debug, trace};
use uuid::Uuid;

use memdoc_core::{
    backend::{Saved, StoreBackend, StoreBackendBuilder},
    document::{ID_FIELD, Record, merge_patch, record_id, storage_key},
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
    query::{FindOptions, Query, SortDirection, identifier_key},
};

use crate::{
    evaluator::{RecordEvaluator, compare_fields},
    registry::Registry,
};

/// Records of one collection, keyed by storage key, in insertion order.
type CollectionMap = IndexMap<String, Record>;

/// How a store mints identifiers for records saved without one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// A per-store `Int64` counter starting at `1`.
    #[default]
    Sequential,
    /// A random v4 UUID in hyphenated string form.
    Uuid,
}

#[derive(Debug, Default)]
struct StoreState {
    collections: IndexMap<String, CollectionMap>,
    counter: i64,
}

impl StoreState {
    fn mint_id(&mut self, strategy: IdStrategy) -> Bson {
        match strategy {
            IdStrategy::Sequential => {
                self.counter += 1;
                Bson::Int64(self.counter)
            }
            IdStrategy::Uuid => Bson::String(Uuid::new_v4().to_string()),
        }
    }

    /// Stores `record` under `key`, keeping the position of a replaced record.
    fn put(&mut self, collection: &str, key: String, record: Record) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(key, record);
    }

    /// Returns the matching records of a collection, in collection order.
    fn matching<'a>(&'a self, collection: &str, query: &Query) -> DocumentStoreResult<Vec<&'a Record>> {
        let id_key = match query {
            Query::Id(id) => Some(identifier_key(id)?),
            _ => None,
        };

        let Some(records) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };

        if let Some(key) = id_key {
            return Ok(records.get(&key).into_iter().collect());
        }

        let mut matched = Vec::new();
        for record in records.values() {
            if RecordEvaluator::new(record).evaluate(query)? {
                matched.push(record);
            }
        }

        Ok(matched)
    }
}

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and shares its state through an `Arc`, so every clone (and
/// every store resolved from the same [`Registry`] scope) observes the same collections.
/// One lock guards all collections and the identifier counter: reads share it, writes take
/// it exclusively, so no operation observes another one half-done.
///
/// Queries other than identifier lookups scan the collection in insertion order.
///
/// # Example
///
/// ```ignore
/// use memdoc_memory::InMemoryStore;
/// use memdoc::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let saved = store.save_document("users", doc! { "name": "Alice" }).await?;
/// assert_eq!(saved.inserted().unwrap().get_i64("id")?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    id_strategy: IdStrategy,
}

impl InMemoryStore {
    /// Creates a new empty store with sequential identifiers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store minting identifiers with `id_strategy`.
    pub fn with_id_strategy(id_strategy: IdStrategy) -> Self {
        Self {
            state: Arc::default(),
            id_strategy,
        }
    }

    /// Creates a builder for constructing an `InMemoryStore` with custom options.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// The identifier strategy of this store.
    pub fn id_strategy(&self) -> IdStrategy {
        self.id_strategy
    }

    /// Returns `true` if both handles share the same underlying data.
    pub fn shares_state_with(&self, other: &InMemoryStore) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn next_id(&self) -> DocumentStoreResult<Bson> {
        let id = self.state.write().await.mint_id(self.id_strategy);
        debug!(%id, "minted identifier");

        Ok(id)
    }

    async fn create_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut state = self.state.write().await;

        if !state.collections.contains_key(name) {
            state.collections.insert(name.to_string(), CollectionMap::new());
            debug!(collection = name, "created collection");
        }

        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> DocumentStoreResult<()> {
        let mut state = self.state.write().await;

        if state.collections.shift_remove(name).is_none() {
            return Err(DocumentStoreError::CollectionNotFound(name.to_string()));
        }
        debug!(collection = name, "dropped collection");

        Ok(())
    }

    async fn list_collections(&self) -> DocumentStoreResult<Vec<String>> {
        Ok(self.state.read().await.collections.keys().cloned().collect())
    }

    async fn save_document(&self, collection: &str, record: Record) -> DocumentStoreResult<Saved> {
        trace!(collection, "save");

        if let Some(id) = record_id(&record) {
            let key = storage_key(id)?;
            self.state.write().await.put(collection, key, record);

            return Ok(Saved::Replaced(1));
        }

        let mut state = self.state.write().await;
        let id = state.mint_id(self.id_strategy);
        let key = storage_key(&id)?;

        let mut stored = Record::new();
        stored.insert(ID_FIELD, id);
        for (field, value) in record {
            if field != ID_FIELD {
                stored.insert(field, value);
            }
        }

        state.put(collection, key.clone(), stored.clone());
        debug!(collection, id = %key, "inserted record");

        Ok(Saved::Inserted(stored))
    }

    async fn update_document(&self, collection: &str, id: Bson, patch: Record) -> DocumentStoreResult<Saved> {
        trace!(collection, "update");

        let key = storage_key(&id)?;
        let mut state = self.state.write().await;
        let current = state
            .collections
            .get(collection)
            .and_then(|records| records.get(&key))
            .cloned()
            .unwrap_or_default();

        let merged = merge_patch(current, patch, &id);
        state.put(collection, key, merged);

        Ok(Saved::Replaced(1))
    }

    async fn get_document(&self, collection: &str, id: &Bson) -> DocumentStoreResult<Option<Record>> {
        trace!(collection, "get");

        let key = storage_key(id)?;
        let state = self.state.read().await;

        Ok(state
            .collections
            .get(collection)
            .and_then(|records| records.get(&key))
            .cloned())
    }

    async fn find_documents(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
        options: &FindOptions,
    ) -> DocumentStoreResult<Vec<Record>> {
        trace!(collection, query = query.kind(), "find");

        let state = self.state.read().await;
        let mut matched = state.matching(collection, query)?;

        if let Some(sort) = &options.sort {
            matched.sort_by(|a, b| {
                let ordering = compare_fields(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(matched
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .map(|record| projection.apply(record))
            .collect())
    }

    async fn find_one_document(
        &self,
        collection: &str,
        query: &Query,
        projection: &Projection,
        options: &FindOptions,
    ) -> DocumentStoreResult<Option<Record>> {
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };

        Ok(self
            .find_documents(collection, query, projection, &options)
            .await?
            .into_iter()
            .next())
    }

    async fn count_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<u64> {
        trace!(collection, query = query.kind(), "count");

        let state = self.state.read().await;
        Ok(state.matching(collection, query)?.len() as u64)
    }

    async fn delete_documents(&self, collection: &str, query: &Query) -> DocumentStoreResult<u64> {
        trace!(collection, query = query.kind(), "delete");

        let mut state = self.state.write().await;
        let keys = state
            .matching(collection, query)?
            .into_iter()
            .filter_map(record_id)
            .map(storage_key)
            .collect::<DocumentStoreResult<Vec<_>>>()?;

        let Some(records) = state.collections.get_mut(collection) else {
            return Ok(0);
        };

        let removed = keys
            .iter()
            .filter(|key| records.shift_remove(key.as_str()).is_some())
            .count() as u64;

        if removed > 0 {
            debug!(collection, removed, "deleted records");
        }

        Ok(removed)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// With a scope, the store is resolved through the given [`Registry`], so builders using the
/// same scope share one store. The identifier strategy only applies to a store created by
/// this builder; a scope that is already registered keeps its own.
///
/// # Example
///
/// ```ignore
/// use memdoc_memory::{InMemoryStore, IdStrategy, Registry};
/// use memdoc::backend::StoreBackendBuilder;
///
/// let registry = Registry::new();
/// let store = InMemoryStore::builder()
///     .id_strategy(IdStrategy::Uuid)
///     .scope("memory://app", &registry)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    id_strategy: IdStrategy,
    scope: Option<(String, Registry)>,
}

impl InMemoryStoreBuilder {
    /// Sets the identifier strategy.
    pub fn id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    /// Resolves the store through `registry` under `scope`.
    pub fn scope(mut self, scope: impl Into<String>, registry: &Registry) -> Self {
        self.scope = Some((scope.into(), registry.clone()));
        self
    }
}

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds the store, registering it under the scope if one was given.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::Initialization`] if the scope is an empty string.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        match self.scope {
            None => Ok(InMemoryStore::with_id_strategy(self.id_strategy)),
            Some((scope, _)) if scope.is_empty() => Err(DocumentStoreError::Initialization(
                "scope must not be empty".to_string(),
            )),
            Some((scope, registry)) => Ok(registry.resolve_with(&scope, self.id_strategy).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use memdoc_core::query::Filter;

    use super::*;

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (name, age) in [("carol", 41), ("alice", 30), ("bob", 25)] {
            store
                .save_document("users", doc! { "name": name, "age": age })
                .await
                .unwrap();
        }
        store
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.get_str("name").unwrap()).collect()
    }

    #[tokio::test]
    async fn save_mints_sequential_ids_first() {
        let store = InMemoryStore::new();

        let saved = store.save_document("c", doc! { "name": "a" }).await.unwrap();
        let record = saved.inserted().unwrap();

        assert_eq!(record, doc! { "id": 1_i64, "name": "a" });
        assert_eq!(record.keys().next().map(String::as_str), Some("id"));
        assert_eq!(store.next_id().await.unwrap(), Bson::Int64(2));
    }

    #[tokio::test]
    async fn null_id_is_treated_as_absent() {
        let store = InMemoryStore::new();

        let saved = store
            .save_document("c", doc! { "id": Bson::Null, "name": "a" })
            .await
            .unwrap();

        assert_eq!(saved, Saved::Inserted(doc! { "id": 1_i64, "name": "a" }));
    }

    #[tokio::test]
    async fn uuid_strategy_mints_strings() {
        let store = InMemoryStore::with_id_strategy(IdStrategy::Uuid);

        let record = store
            .save_document("c", doc! { "name": "a" })
            .await
            .unwrap()
            .inserted()
            .unwrap();

        let id = record.get_str("id").unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn replacing_keeps_position() {
        let store = seeded().await;

        store
            .save_document("users", doc! { "id": 1_i64, "name": "carol", "age": 42 })
            .await
            .unwrap();

        let all = store
            .find_documents("users", &Query::all(), &Projection::all(), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(names(&all), ["carol", "alice", "bob"]);
        assert_eq!(all[0].get_i32("age").unwrap(), 42);
    }

    #[tokio::test]
    async fn numeric_and_string_ids_share_a_slot() {
        let store = InMemoryStore::new();

        store.save_document("c", doc! { "id": 1, "v": "int" }).await.unwrap();
        store.save_document("c", doc! { "id": "1", "v": "str" }).await.unwrap();

        assert_eq!(store.count_documents("c", &Query::all()).await.unwrap(), 1);
        let found = store.get_document("c", &Bson::Int64(1)).await.unwrap().unwrap();
        assert_eq!(found.get_str("v").unwrap(), "str");
    }

    #[tokio::test]
    async fn uncoercible_ids_are_rejected() {
        let store = InMemoryStore::new();

        let err = store
            .save_document("c", doc! { "id": { "nested": 1 } })
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn update_merges_into_absent_record() {
        let store = InMemoryStore::new();

        store
            .update_document("c", Bson::String("k".into()), doc! { "a": 1 })
            .await
            .unwrap();
        store
            .update_document("c", Bson::String("k".into()), doc! { "b": 2 })
            .await
            .unwrap();

        let record = store.get_document("c", &Bson::String("k".into())).await.unwrap();
        assert_eq!(record, Some(doc! { "id": "k", "a": 1, "b": 2 }));
    }

    #[tokio::test]
    async fn sort_skip_limit_apply_after_matching() {
        let store = seeded().await;
        let options = FindOptions::builder()
            .sort("age", SortDirection::Desc)
            .skip(1)
            .limit(1)
            .build();

        let found = store
            .find_documents("users", &Filter::gt("age", 20), &Projection::fields(["name"]), &options)
            .await
            .unwrap();

        assert_eq!(found, vec![doc! { "name": "alice" }]);
    }

    #[tokio::test]
    async fn sort_places_missing_values_first() {
        let store = seeded().await;
        store.save_document("users", doc! { "name": "dave" }).await.unwrap();

        let options = FindOptions::builder().sort("age", SortDirection::Asc).build();
        let found = store
            .find_documents("users", &Query::all(), &Projection::all(), &options)
            .await
            .unwrap();

        assert_eq!(names(&found), ["dave", "bob", "alice", "carol"]);
    }

    #[tokio::test]
    async fn sort_orders_mixed_kinds_by_rank() {
        let store = InMemoryStore::new();
        for v in [Bson::Int32(2), Bson::String("x".into()), Bson::Int32(1)] {
            store.save_document("c", doc! { "v": v }).await.unwrap();
        }

        let asc = FindOptions::builder().sort("v", SortDirection::Asc).build();
        let found = store
            .find_documents("c", &Query::all(), &Projection::fields(["v"]), &asc)
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "v": 1 }, doc! { "v": 2 }, doc! { "v": "x" }]);

        let desc = FindOptions::builder().sort("v", SortDirection::Desc).build();
        let found = store
            .find_documents("c", &Query::all(), &Projection::fields(["v"]), &desc)
            .await
            .unwrap();
        assert_eq!(found, vec![doc! { "v": "x" }, doc! { "v": 2 }, doc! { "v": 1 }]);
    }

    #[tokio::test]
    async fn counter_survives_deletes_and_drops() {
        let store = InMemoryStore::new();

        let first = store.save_document("c", doc! { "a": 1 }).await.unwrap();
        assert_eq!(first.inserted().unwrap().get("id"), Some(&Bson::Int64(1)));

        assert_eq!(store.delete_documents("c", &Query::id(1)).await.unwrap(), 1);
        store.drop_collection("c").await.unwrap();

        let second = store.save_document("c", doc! { "b": 1 }).await.unwrap();
        assert_eq!(second.inserted().unwrap().get("id"), Some(&Bson::Int64(2)));
    }

    #[tokio::test]
    async fn update_of_absent_key_does_not_mint() {
        let store = InMemoryStore::new();

        store.update_document("c", Bson::Int64(7), doc! { "a": 1 }).await.unwrap();
        store.update_document("c", Bson::String("k".into()), doc! { "a": 2 }).await.unwrap();

        let saved = store.save_document("c", doc! { "b": 1 }).await.unwrap();
        assert_eq!(saved.inserted().unwrap().get("id"), Some(&Bson::Int64(1)));
    }

    #[tokio::test]
    async fn null_identifier_query_is_malformed() {
        let store = seeded().await;

        let found = store
            .find_documents("users", &Query::Id(Bson::Null), &Projection::all(), &FindOptions::default())
            .await;
        assert!(matches!(found, Err(DocumentStoreError::MalformedQuery(_))));

        let removed = store.delete_documents("nowhere", &Query::Id(Bson::Null)).await;
        assert!(matches!(removed, Err(DocumentStoreError::MalformedQuery(_))));
    }

    #[tokio::test]
    async fn find_one_returns_first_in_collection_order() {
        let store = seeded().await;

        let found = store
            .find_one_document("users", &Filter::lt("age", 35), &Projection::all(), &FindOptions::default())
            .await
            .unwrap();

        assert_eq!(found.unwrap().get_str("name").unwrap(), "alice");
    }

    #[tokio::test]
    async fn delete_preserves_remaining_order() {
        let store = seeded().await;

        let removed = store
            .delete_documents("users", &Filter::lt("age", 35))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        store.save_document("users", doc! { "name": "erin" }).await.unwrap();
        let all = store
            .find_documents("users", &Query::all(), &Projection::all(), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(names(&all), ["carol", "erin"]);
    }

    #[tokio::test]
    async fn delete_by_missing_id_removes_nothing() {
        let store = seeded().await;

        assert_eq!(store.delete_documents("users", &Query::id(99)).await.unwrap(), 0);
        assert_eq!(store.delete_documents("nowhere", &Query::all()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn collections_are_created_and_dropped() {
        let store = InMemoryStore::new();

        store.create_collection("a").await.unwrap();
        store.create_collection("a").await.unwrap();
        store.save_document("b", doc! { "x": 1 }).await.unwrap();
        assert_eq!(store.list_collections().await.unwrap(), ["a", "b"]);

        store.drop_collection("a").await.unwrap();
        assert!(matches!(
            store.drop_collection("a").await,
            Err(DocumentStoreError::CollectionNotFound(_))
        ));
        assert_eq!(store.list_collections().await.unwrap(), ["b"]);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        clone.save_document("c", doc! { "x": 1 }).await.unwrap();

        assert!(store.shares_state_with(&clone));
        assert_eq!(store.count_documents("c", &Query::all()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn builder_rejects_empty_scope() {
        let registry = Registry::new();
        let result = InMemoryStore::builder().scope("", &registry).build().await;

        assert!(matches!(result, Err(DocumentStoreError::Initialization(_))));
    }

    #[tokio::test]
    async fn builder_resolves_scopes_through_registry() {
        let registry = Registry::new();
        let first = InMemoryStore::builder().scope("memory://a", &registry).build().await.unwrap();
        let second = InMemoryStore::builder().scope("memory://a", &registry).build().await.unwrap();
        let private = InMemoryStore::builder().build().await.unwrap();

        assert!(first.shares_state_with(&second));
        assert!(!first.shares_state_with(&private));
    }
}
