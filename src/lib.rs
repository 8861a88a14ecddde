//! lokidb - an in-memory, schemaless document database
//!
//! Documents are JSON-shaped records held in named collections. Collections
//! maintain binary-sorted, unique, and exact-match indices over their
//! documents, support MongoDB-style query expressions through chainable
//! [`Resultset`] pipelines, and can be observed by auto-maintained
//! [`DynamicView`]s. A [`Database`] owns a set of named collections and
//! knows how to serialize itself through a pluggable storage adapter.

pub mod collection;
pub mod comparator;
pub mod db;
pub mod diagnostics;
pub mod document;
pub mod dynamic_view;
pub mod index;
pub mod operators;
pub mod query;
pub mod resultset;

pub use collection::{Collection, CollectionError, CollectionOptions, CollectionResult};
pub use comparator::Comparator;
pub use db::{Database, DatabaseOptions, DbError, DbResult, StorageAdapter};
pub use document::Meta;
pub use dynamic_view::DynamicView;
pub use query::Query;
pub use resultset::Resultset;
