//! Database-level errors
//!
//! Mirrors [`crate::collection::error::CollectionError`]'s shape: a plain
//! enum, hand-written `Display`, `std::error::Error`, and a `code()` tag.
//! Collection errors bubble up wrapped rather than flattened, so callers
//! can still match on the originating collection failure.

use std::fmt;

use crate::collection::CollectionError;

pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by the [`super::Database`] container and its storage
/// adapter boundary.
#[derive(Debug)]
pub enum DbError {
    /// `get_collection`/`remove_collection` for a name that does not exist.
    CollectionNotFound(String),
    /// The storage adapter returned an error or a malformed payload.
    AdapterError(String),
    /// A serialized payload could not be parsed back into a database.
    SerializationError(String),
    /// A collection-level operation failed while loading or restoring.
    Collection(CollectionError),
}

impl DbError {
    pub fn adapter_error(msg: impl Into<String>) -> Self {
        DbError::AdapterError(msg.into())
    }

    pub fn serialization_error(msg: impl Into<String>) -> Self {
        DbError::SerializationError(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            DbError::CollectionNotFound(_) => "LOKI_COLLECTION_NOT_FOUND",
            DbError::AdapterError(_) => "LOKI_ADAPTER_ERROR",
            DbError::SerializationError(_) => "LOKI_SERIALIZATION_ERROR",
            DbError::Collection(e) => e.code(),
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::CollectionNotFound(name) => write!(f, "no collection named '{name}'"),
            DbError::AdapterError(msg) => write!(f, "storage adapter error: {msg}"),
            DbError::SerializationError(msg) => write!(f, "serialization error: {msg}"),
            DbError::Collection(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<CollectionError> for DbError {
    fn from(e: CollectionError) -> Self {
        DbError::Collection(e)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::SerializationError(e.to_string())
    }
}
