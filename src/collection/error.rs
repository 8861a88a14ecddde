//! Collection-level errors (spec.md §7)

use std::fmt;

use crate::index::IndexError;

pub type CollectionResult<T> = Result<T, CollectionError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionError {
    /// Non-object inserted, null document, non-integer id to `get`, unknown
    /// transform type, invalid sort key.
    InvalidArgument(String),
    /// A `UniqueIndex::set` saw an existing key.
    DuplicateKey { field: String, value: String },
    /// `update` called with a document lacking `$id`.
    UnsyncedDocument,
    /// `update`/`remove` referenced a `$id` absent from the collection.
    NotFound(u64),
    /// `checkIndex`/`ensureIndex` referenced a non-existent binary index.
    InvalidIndex(String),
    /// A named transform is unknown or malformed.
    TransformError(String),
}

impl CollectionError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn transform_error(msg: impl Into<String>) -> Self {
        Self::TransformError(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            CollectionError::InvalidArgument(_) => "LOKI_INVALID_ARGUMENT",
            CollectionError::DuplicateKey { .. } => "LOKI_DUPLICATE_KEY",
            CollectionError::UnsyncedDocument => "LOKI_UNSYNCED_DOCUMENT",
            CollectionError::NotFound(_) => "LOKI_NOT_FOUND",
            CollectionError::InvalidIndex(_) => "LOKI_INVALID_INDEX",
            CollectionError::TransformError(_) => "LOKI_TRANSFORM_ERROR",
        }
    }
}

impl From<IndexError> for CollectionError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::NotFound(p) => CollectionError::InvalidIndex(p),
            IndexError::DuplicateKey { field, value } => {
                CollectionError::DuplicateKey { field, value }
            }
        }
    }
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            CollectionError::DuplicateKey { field, value } => {
                write!(f, "duplicate key '{}' for unique field '{}'", value, field)
            }
            CollectionError::UnsyncedDocument => {
                write!(f, "update() requires a document carrying its $id")
            }
            CollectionError::NotFound(id) => write!(f, "no document with $id {}", id),
            CollectionError::InvalidIndex(p) => write!(f, "no binary index on property '{}'", p),
            CollectionError::TransformError(msg) => write!(f, "transform error: {}", msg),
        }
    }
}

impl std::error::Error for CollectionError {}
