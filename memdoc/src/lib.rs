//! An embeddable document store with document-database semantics.
//!
//! memdoc keeps named collections of BSON records in memory and exposes the CRUD surface of
//! a document database: identifier-keyed records, minted identifiers, equality and operator
//! queries, field projections, and sort/skip/limit options. Every operation is `async` and
//! never completes on its first poll.
//!
//! # Quick Start
//!
//! ```ignore
//! use memdoc::{prelude::*, bson::doc};
//!
//! #[tokio::main]
//! async fn main() -> DocumentStoreResult<()> {
//!     let registry = Registry::new();
//!     let store = connect(ConnectOptions::new(), &registry).await?;
//!     let people = store.get_collection("people").await?;
//!
//!     people.save(doc! { "name": "a" }).await?;   // Saved::Inserted({ id: 1, name: "a" })
//!     people.save(doc! { "name": "b" }).await?;   // Saved::Inserted({ id: 2, name: "b" })
//!
//!     let found = people.find(doc! { "name": "a" }).await?;
//!     assert_eq!(found, vec![doc! { "id": 1_i64, "name": "a" }]);
//!
//!     assert_eq!(people.delete(doc! { "name": "a" }).await?, 1);
//!     store.close().await
//! }
//! ```
//!
//! # Typed documents
//!
//! ```ignore
//! use memdoc::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(skip_serializing_if = "Option::is_none")]
//!     pub id: Option<i64>,
//!     pub name: String,
//! }
//!
//! impl Document for User {
//!     fn collection_name() -> &'static str { "users" }
//! }
//!
//! let users = store.typed_collection::<User>();
//! let alice = users.save(&User { id: None, name: "Alice".into() }).await?.inserted();
//! let adults = users.find(Filter::gte("age", 18)).await?;
//! ```
//!
//! # Scopes
//!
//! Connections that pass the same [`ConnectOptions::scope`] through the same
//! [`memory::Registry`] share one store. Without a scope, each connection is private.

pub mod connect;
pub mod prelude;

pub use memdoc_core::{backend, collection, completion, document, error, projection, query, store};

pub use connect::{ConnectOptions, connect};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend.
pub mod memory {
    pub use memdoc_memory::{IdStrategy, InMemoryStore, InMemoryStoreBuilder, Registry, evaluator};
}
