//! Query compilation errors

use std::fmt;

/// Result type for query compilation.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while compiling a query object into an [`super::ast::Expr`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query (or a sub-query) was not a well-formed expression.
    InvalidArgument(String),
}

impl QueryError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Stable error code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidArgument(_) => "LOKI_INVALID_ARGUMENT",
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidArgument(msg) => write!(f, "invalid query: {}", msg),
        }
    }
}

impl std::error::Error for QueryError {}
