//! Scope-keyed registry of shared in-memory stores.

use std::{collections::HashMap, sync::Arc};

use mea::mutex::Mutex;
use tracing::debug;

use crate::store::{IdStrategy, InMemoryStore};

/// Maps scope keys (for example connection URIs) to shared stores.
///
/// Resolving the same scope twice yields handles on the same data; resolving without a scope
/// yields a fresh private store. Entries are created on first use and never removed.
/// Clones of a registry share one map.
#[derive(Debug, Clone)]
pub struct Registry {
    stores: Arc<Mutex<HashMap<String, InMemoryStore>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            stores: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves a store with sequential identifiers.
    pub async fn resolve(&self, scope: Option<&str>) -> InMemoryStore {
        match scope {
            Some(scope) => self.resolve_with(scope, IdStrategy::default()).await,
            None => InMemoryStore::new(),
        }
    }

    /// Resolves the store registered under `scope`, registering a new one minting
    /// identifiers with `id_strategy` if there is none.
    pub async fn resolve_with(&self, scope: &str, id_strategy: IdStrategy) -> InMemoryStore {
        let mut stores = self.stores.lock().await;

        stores
            .entry(scope.to_string())
            .or_insert_with(|| {
                debug!(scope, ?id_strategy, "registered store");
                InMemoryStore::with_id_strategy(id_strategy)
            })
            .clone()
    }

    /// Number of registered scopes.
    pub async fn len(&self) -> usize {
        self.stores.lock().await.len()
    }

    /// Returns `true` if no scope has been registered.
    pub async fn is_empty(&self) -> bool {
        self.stores.lock().await.is_empty()
    }

    /// The registered scope keys, sorted.
    pub async fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = self.stores.lock().await.keys().cloned().collect();
        scopes.sort();
        scopes
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use memdoc_core::{backend::StoreBackend, query::Query};

    use super::*;

    #[tokio::test]
    async fn same_scope_shares_data() {
        let registry = Registry::new();
        let first = registry.resolve(Some("memory://shared")).await;
        let second = registry.resolve(Some("memory://shared")).await;

        first.save_document("c", doc! { "x": 1 }).await.unwrap();

        assert_eq!(second.count_documents("c", &Query::all()).await.unwrap(), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn absent_scope_is_private() {
        let registry = Registry::new();
        let first = registry.resolve(None).await;
        let second = registry.resolve(None).await;

        first.save_document("c", doc! { "x": 1 }).await.unwrap();

        assert_eq!(second.count_documents("c", &Query::all()).await.unwrap(), 0);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn clones_share_the_map() {
        let registry = Registry::new();
        let clone = registry.clone();

        clone.resolve(Some("b")).await;
        registry.resolve(Some("a")).await;

        assert_eq!(registry.scopes().await, ["a", "b"]);
    }

    #[tokio::test]
    async fn registered_strategy_wins() {
        let registry = Registry::new();
        registry.resolve_with("s", IdStrategy::Uuid).await;

        let again = registry.resolve(Some("s")).await;
        assert_eq!(again.id_strategy(), IdStrategy::Uuid);
    }
}
