//! Compiled query expression tree
//!
//! [`Expr`] is what [`super::compiler::compile`] produces from a
//! MongoDB-style query object, and what [`Expr::matches`] evaluates
//! against a document. A bare `{field: V}` (V not an object/date) is
//! normalized to `{field: {$eq: V}}` and a multi-field object is
//! normalized to an implicit `$and` before this tree is built - by the
//! time an `Expr` exists, all of that shorthand is already gone.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use super::path::CompiledPath;
use crate::operators::{self, OpTag};

/// A user-supplied predicate for `$where`.
#[derive(Clone)]
pub struct WherePredicate(pub Arc<dyn Fn(&Value) -> bool + Send + Sync>);

impl fmt::Debug for WherePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WherePredicate(..)")
    }
}

impl PartialEq for WherePredicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A single field-scoped operator, with its tag and payload.
#[derive(Debug, Clone)]
pub enum FieldOp {
    Eq(Value),
    Aeq(Value),
    Ne(Value),
    Dteq(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    Jgt(Value),
    Jgte(Value),
    Jlt(Value),
    Jlte(Value),
    Between(Value, Value),
    JBetween(Value, Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    KeyIn(Value),
    NKeyIn(Value),
    DefinedIn(Value),
    UndefinedIn(Value),
    Regex(Arc<Regex>),
    ContainsString(Value),
    Contains(Value),
    ContainsAny(Vec<Value>),
    ContainsNone(Vec<Value>),
    ElemMatch(Box<Expr>),
    Type(String),
    Finite(bool),
    Size(u64),
    Len(u64),
    Exists(bool),
}

impl FieldOp {
    pub fn tag(&self) -> OpTag {
        match self {
            FieldOp::Eq(_) => OpTag::Eq,
            FieldOp::Aeq(_) => OpTag::Aeq,
            FieldOp::Ne(_) => OpTag::Ne,
            FieldOp::Dteq(_) => OpTag::Dteq,
            FieldOp::Gt(_) => OpTag::Gt,
            FieldOp::Gte(_) => OpTag::Gte,
            FieldOp::Lt(_) => OpTag::Lt,
            FieldOp::Lte(_) => OpTag::Lte,
            FieldOp::Jgt(_) => OpTag::Jgt,
            FieldOp::Jgte(_) => OpTag::Jgte,
            FieldOp::Jlt(_) => OpTag::Jlt,
            FieldOp::Jlte(_) => OpTag::Jlte,
            FieldOp::Between(..) => OpTag::Between,
            FieldOp::JBetween(..) => OpTag::JBetween,
            FieldOp::In(_) => OpTag::In,
            FieldOp::Nin(_) => OpTag::Nin,
            FieldOp::KeyIn(_) => OpTag::KeyIn,
            FieldOp::NKeyIn(_) => OpTag::NKeyIn,
            FieldOp::DefinedIn(_) => OpTag::DefinedIn,
            FieldOp::UndefinedIn(_) => OpTag::UndefinedIn,
            FieldOp::Regex(_) => OpTag::Regex,
            FieldOp::ContainsString(_) => OpTag::ContainsString,
            FieldOp::Contains(_) => OpTag::Contains,
            FieldOp::ContainsAny(_) => OpTag::ContainsAny,
            FieldOp::ContainsNone(_) => OpTag::ContainsNone,
            FieldOp::ElemMatch(_) => OpTag::ElemMatch,
            FieldOp::Type(_) => OpTag::Type,
            FieldOp::Finite(_) => OpTag::Finite,
            FieldOp::Size(_) => OpTag::Size,
            FieldOp::Len(_) => OpTag::Len,
            FieldOp::Exists(_) => OpTag::Exists,
        }
    }

    /// Evaluates the operator against a resolved value. `$exists` is the
    /// only operator that sees field *absence* directly; every other
    /// operator treats a missing field as JSON `null` (matching the
    /// comparator's unification of `null`/`undefined`).
    fn eval(&self, value: Option<&Value>) -> bool {
        if let FieldOp::Exists(expected) = self {
            return operators::exists(value, *expected);
        }
        static NULL: Value = Value::Null;
        let v = value.unwrap_or(&NULL);
        match self {
            FieldOp::Eq(q) | FieldOp::Aeq(q) => operators::eq(v, q),
            FieldOp::Ne(q) => operators::ne(v, q),
            FieldOp::Dteq(q) => operators::dteq(v, q),
            FieldOp::Gt(q) => operators::gt(v, q, false),
            FieldOp::Gte(q) => operators::gt(v, q, true),
            FieldOp::Lt(q) => operators::lt(v, q, false),
            FieldOp::Lte(q) => operators::lt(v, q, true),
            FieldOp::Jgt(q) => operators::jgt(v, q, false),
            FieldOp::Jgte(q) => operators::jgt(v, q, true),
            FieldOp::Jlt(q) => operators::jlt(v, q, false),
            FieldOp::Jlte(q) => operators::jlt(v, q, true),
            FieldOp::Between(lo, hi) => operators::between(v, lo, hi),
            FieldOp::JBetween(lo, hi) => operators::j_between(v, lo, hi),
            FieldOp::In(set) => operators::in_set(v, set),
            FieldOp::Nin(set) => operators::nin_set(v, set),
            FieldOp::KeyIn(keys) => operators::key_in(v, keys),
            FieldOp::NKeyIn(keys) => operators::nkey_in(v, keys),
            FieldOp::DefinedIn(keys) => operators::defined_in(v, keys),
            FieldOp::UndefinedIn(keys) => operators::undefined_in(v, keys),
            FieldOp::Regex(re) => operators::regex_match(v, re),
            FieldOp::ContainsString(q) => operators::contains_string(v, q),
            FieldOp::Contains(q) => operators::contains(v, q),
            FieldOp::ContainsAny(set) => operators::contains_any(v, set),
            FieldOp::ContainsNone(set) => operators::contains_none(v, set),
            FieldOp::ElemMatch(sub) => match v {
                Value::Array(items) => items.iter().any(|item| sub.matches(item)),
                _ => false,
            },
            FieldOp::Type(expected) => operators::type_match(v, expected),
            FieldOp::Finite(expected) => operators::finite(v, *expected),
            FieldOp::Size(expected) => operators::size(v, *expected),
            FieldOp::Len(expected) => operators::len(v, *expected),
            FieldOp::Exists(_) => unreachable!("handled above"),
        }
    }
}

/// A compiled query expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `{path: op}` - a single field-scoped operator over a (possibly
    /// dotted, possibly array-distributing) path.
    Field(CompiledPath, FieldOp),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Where(WherePredicate),
}

impl Expr {
    /// Evaluates the expression against a document.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Expr::Field(path, op) => path.test(document, &mut |v| op.eval(v)),
            Expr::And(exprs) => exprs.iter().all(|e| e.matches(document)),
            Expr::Or(exprs) => exprs.iter().any(|e| e.matches(document)),
            Expr::Not(inner) => !inner.matches(document),
            Expr::Where(pred) => (pred.0)(document),
        }
    }

    /// If this expression is exactly one field-scoped operator (the case
    /// the query planner can potentially service from a single index),
    /// returns it.
    pub fn as_single_field(&self) -> Option<(&CompiledPath, &FieldOp)> {
        match self {
            Expr::Field(path, op) => Some((path, op)),
            _ => None,
        }
    }
}
