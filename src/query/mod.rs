//! The query compiler: MongoDB-style query objects compiled once into a
//! reusable [`ast::Expr`] tree.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod path;

pub use ast::{Expr, FieldOp, WherePredicate};
pub use error::{QueryError, QueryResult};
pub use path::CompiledPath;

use std::sync::Arc;

use serde_json::Value;

/// A compiled, reusable query. Construct with [`Query::compile`] from a
/// MongoDB-style query object, or [`Query::where_fn`] for a `$where`
/// predicate that can't be expressed as JSON.
#[derive(Debug, Clone)]
pub struct Query(Expr);

impl Query {
    /// Compiles a query object (see module docs for normalization rules).
    pub fn compile(value: &Value) -> QueryResult<Self> {
        compiler::compile(value).map(Query)
    }

    /// Builds a `$where` query from a user predicate.
    pub fn where_fn<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Query(Expr::Where(WherePredicate(Arc::new(f))))
    }

    /// Evaluates the query against a document.
    pub fn matches(&self, document: &Value) -> bool {
        self.0.matches(document)
    }

    /// Access to the underlying compiled expression.
    pub fn expr(&self) -> &Expr {
        &self.0
    }

    /// Wraps an already-compiled expression (used internally by the
    /// collection/resultset layer to compose `$and` without recompiling).
    pub fn from_expr(expr: Expr) -> Self {
        Query(expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn where_fn_is_evaluated() {
        let q = Query::where_fn(|doc| doc.get("age").and_then(|v| v.as_i64()).unwrap_or(0) > 18);
        assert!(q.matches(&json!({"age": 30})));
        assert!(!q.matches(&json!({"age": 10})));
    }
}
