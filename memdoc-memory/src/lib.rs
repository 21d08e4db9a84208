//! In-memory document storage backend for memdoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait,
//! the query matcher it evaluates queries with, and a [`Registry`] that lets several
//! connections share one store through a scope key.
//!
//! # Features
//!
//! - **Thread-safe access** - One async-aware RwLock per store
//! - **Insertion order** - Records are returned in the order they were first saved
//! - **Scoped sharing** - Stores resolved under the same scope share all data
//!
//! # Quick Start
//!
//! ```ignore
//! use memdoc::{store::DocumentStore, memory::InMemoryStore};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?);
//!     let users = store.get_collection("users").await?;
//!
//!     users.save(doc! { "name": "Alice" }).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as memdoc_memory;

pub mod evaluator;
pub mod registry;
pub mod store;

pub use registry::Registry;
pub use store::{IdStrategy, InMemoryStore, InMemoryStoreBuilder};
