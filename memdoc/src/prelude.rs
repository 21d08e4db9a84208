//! Convenient re-exports of commonly used types from memdoc.
//!
//! ```ignore
//! use memdoc::prelude::*;
//! ```

pub use memdoc_core::{
    backend::{Saved, StoreBackend, StoreBackendBuilder},
    collection::{Collection, TypedCollection},
    document::{Document, DocumentExt, ID_FIELD, Record},
    error::{DocumentStoreError, DocumentStoreResult},
    projection::Projection,
    query::{FieldPredicate, Filter, FindOptions, IntoQuery, Predicate, Query, QueryVisitor, Sort, SortDirection},
    store::DocumentStore,
};
pub use memdoc_memory::{IdStrategy, InMemoryStore, Registry};

pub use crate::connect::{ConnectOptions, connect};
