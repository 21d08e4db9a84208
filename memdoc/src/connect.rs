//! Connection options and the `connect` entry point.

use serde::Deserialize;
use tracing::debug;

use memdoc_core::{
    backend::StoreBackendBuilder,
    error::DocumentStoreResult,
    store::DocumentStore,
};
use memdoc_memory::{IdStrategy, InMemoryStore, Registry};

/// Options for [`connect`].
///
/// Deserializable from any `serde` format; every field has a default.
///
/// ```ignore
/// let options: ConnectOptions = serde_json::from_str(r#"{ "scope": "memory://app" }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    /// Registry scope key. Connections with the same scope share one store; without a scope
    /// every connection gets a private store.
    pub scope: Option<String>,
    /// How the store mints identifiers for records saved without one.
    pub id_strategy: IdStrategy,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }
}

/// Opens a document store backed by memory.
///
/// With a scope, the store is resolved through `registry`, so every connection using that
/// scope sees the same collections.
///
/// # Errors
///
/// Returns [`Initialization`](memdoc_core::error::DocumentStoreError::Initialization) if the
/// scope is an empty string.
pub async fn connect(options: ConnectOptions, registry: &Registry) -> DocumentStoreResult<DocumentStore<InMemoryStore>> {
    let mut builder = InMemoryStore::builder().id_strategy(options.id_strategy);

    if let Some(scope) = options.scope {
        debug!(scope = %scope, "connecting to scoped store");
        builder = builder.scope(scope, registry);
    }

    Ok(DocumentStore::new(builder.build().await?))
}
