//! Index subsystem errors

use std::fmt;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// `checkIndex`/rebuild referenced a binary index that was never created.
    NotFound(String),
    /// A `UniqueIndex::set` saw an existing non-null key.
    DuplicateKey { field: String, value: String },
}

impl IndexError {
    pub fn not_found(property: impl Into<String>) -> Self {
        Self::NotFound(property.into())
    }

    pub fn duplicate_key(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::DuplicateKey {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            IndexError::NotFound(_) => "LOKI_INVALID_INDEX",
            IndexError::DuplicateKey { .. } => "LOKI_DUPLICATE_KEY",
        }
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexError::NotFound(p) => write!(f, "no binary index on property '{}'", p),
            IndexError::DuplicateKey { field, value } => {
                write!(f, "duplicate key '{}' for unique field '{}'", value, field)
            }
        }
    }
}

impl std::error::Error for IndexError {}
