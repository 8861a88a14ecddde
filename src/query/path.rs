//! Dot-notation path compilation and array-aware resolution
//!
//! A path like `"a.b.c"` is split into segments once, at query-construction
//! time, and cached on the [`super::ast::Expr`] that owns it. Resolution
//! is array-aware: if a path element's current value is an array, the
//! predicate is satisfied if *any* element's sub-scan succeeds - this is
//! what lets `{"tags.name": "x"}` match a document whose `tags` is an
//! array of objects.

use serde_json::Value;

/// A dot-notation path compiled into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPath {
    segments: Vec<String>,
    original: String,
}

impl CompiledPath {
    /// Compiles a dot-notation path, e.g. `"address.city"`.
    pub fn compile(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
            original: path.to_string(),
        }
    }

    /// The original, uncompiled path string.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Whether this is a plain, non-dotted field name.
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }

    /// Evaluates `leaf` against every value the path resolves to in
    /// `document`, returning `true` as soon as one resolution satisfies
    /// it. `leaf` receives `None` when the path element is absent.
    pub fn test<'a>(&self, document: &'a Value, leaf: &mut dyn FnMut(Option<&'a Value>) -> bool) -> bool {
        resolve(&self.segments, document, leaf)
    }

    /// Resolves the path to a single scalar value for sort-key extraction.
    /// Does not distribute over arrays; returns `Value::Null` for a
    /// missing field.
    pub fn get_scalar(&self, document: &Value) -> Value {
        let mut current = document;
        for segment in &self.segments {
            match current.get(segment.as_str()) {
                Some(next) => current = next,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

fn resolve<'a>(
    segments: &[String],
    value: &'a Value,
    leaf: &mut dyn FnMut(Option<&'a Value>) -> bool,
) -> bool {
    if let Value::Array(items) = value {
        return items.iter().any(|item| resolve(segments, item, leaf));
    }
    match segments.split_first() {
        None => leaf(Some(value)),
        Some((head, rest)) => match value {
            Value::Object(map) => match map.get(head.as_str()) {
                Some(next) => resolve(rest, next, leaf),
                None => leaf(None),
            },
            _ => leaf(None),
        },
    }
}
