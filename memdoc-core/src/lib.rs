//! An embeddable document store with document-database semantics.
//!
//! This crate is the backend-agnostic core of memdoc and provides:
//!
//! - **Records and documents** ([`document`]) - BSON records, identifier keys, typed documents
//! - **Store backend abstraction** ([`backend`]) - The trait a concrete store implements
//! - **Queries** ([`query`]) - Selector parsing, predicates, and find options
//! - **Projections** ([`projection`]) - Field narrowing of read results
//! - **Collections interface** ([`collection`]) - The CRUD façade over a backend
//! - **Document store** ([`store`]) - Collection handles and store lifecycle
//! - **Deferred completion** ([`completion`]) - Operations never resolve on their first poll
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use memdoc_core::document::Document;
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
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as memdoc_core;

pub mod backend;
pub mod collection;
pub mod completion;
pub mod document;
pub mod error;
pub mod projection;
pub mod query;
pub mod store;
