//! The closed set of query operators (`LokiOps`)
//!
//! Every operator is identified by a [`OpTag`] so the query compiler can
//! statically decide index eligibility (spec-mandated: a closed sum type,
//! not a runtime-resolvable callable table). The predicate functions below
//! take `(document_value, query_value)` and never mutate either side.
//!
//! `$j*` variants use raw, non-coercive comparison (`Value`'s own
//! `PartialOrd`-style numeric/string comparison); every other relational
//! operator goes through [`Comparator`], which is mandatory so sort order
//! and query results never disagree.

use regex::Regex;
use serde_json::Value;

use crate::comparator::Comparator;

/// Tag for every operator in the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpTag {
    Eq,
    Aeq,
    Ne,
    Dteq,
    Gt,
    Gte,
    Lt,
    Lte,
    Jgt,
    Jgte,
    Jlt,
    Jlte,
    Between,
    JBetween,
    In,
    Nin,
    KeyIn,
    NKeyIn,
    DefinedIn,
    UndefinedIn,
    Regex,
    ContainsString,
    Contains,
    ContainsAny,
    ContainsNone,
    ElemMatch,
    Type,
    Finite,
    Size,
    Len,
    Where,
    Exists,
    Not,
    And,
    Or,
}

impl OpTag {
    /// Whether the query planner may service this operator from a
    /// [`crate::index::BinaryIndex`] instead of a linear scan.
    pub fn is_index_eligible(self) -> bool {
        matches!(
            self,
            OpTag::Eq
                | OpTag::Aeq
                | OpTag::Dteq
                | OpTag::Gt
                | OpTag::Gte
                | OpTag::Lt
                | OpTag::Lte
                | OpTag::In
                | OpTag::Between
        )
    }
}

/// `$eq` / `$aeq`: abstract (coercive) equality via the comparator.
pub fn eq(value: &Value, query: &Value) -> bool {
    Comparator::aeq(value, query)
}

/// `$ne`: negated abstract equality.
pub fn ne(value: &Value, query: &Value) -> bool {
    !eq(value, query)
}

/// `$dteq`: equality after parsing both sides as RFC3339 timestamps.
/// Falls back to abstract equality if either side doesn't parse as a date.
pub fn dteq(value: &Value, query: &Value) -> bool {
    match (parse_date_millis(value), parse_date_millis(query)) {
        (Some(a), Some(b)) => a == b,
        _ => eq(value, query),
    }
}

fn parse_date_millis(v: &Value) -> Option<i64> {
    match v {
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// `$gt` / `$gte` / `$lt` / `$lte` via the comparator.
pub fn gt(value: &Value, query: &Value, or_equal: bool) -> bool {
    Comparator::gt(value, query, or_equal)
}

pub fn lt(value: &Value, query: &Value, or_equal: bool) -> bool {
    Comparator::lt(value, query, or_equal)
}

/// `$jgt`/`$jgte`/`$jlt`/`$jlte`: raw, non-coercive comparison. Only
/// same-shaped number/string pairs compare; anything else is `false`.
pub fn j_compare(value: &Value, query: &Value) -> Option<std::cmp::Ordering> {
    match (value, query) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

pub fn jgt(value: &Value, query: &Value, or_equal: bool) -> bool {
    match j_compare(value, query) {
        Some(std::cmp::Ordering::Greater) => true,
        Some(std::cmp::Ordering::Equal) => or_equal,
        _ => false,
    }
}

pub fn jlt(value: &Value, query: &Value, or_equal: bool) -> bool {
    match j_compare(value, query) {
        Some(std::cmp::Ordering::Less) => true,
        Some(std::cmp::Ordering::Equal) => or_equal,
        _ => false,
    }
}

/// `$between`: inclusive range `[low, high]` via the comparator.
pub fn between(value: &Value, low: &Value, high: &Value) -> bool {
    Comparator::gt(value, low, true) && Comparator::lt(value, high, true)
}

/// `$jbetween`: inclusive range `[low, high]` via raw comparison.
pub fn j_between(value: &Value, low: &Value, high: &Value) -> bool {
    jgt(value, low, true) && jlt(value, high, true)
}

/// `$in`: abstract-equal to any element of `set`.
pub fn in_set(value: &Value, set: &[Value]) -> bool {
    set.iter().any(|candidate| eq(value, candidate))
}

/// `$nin`: abstract-equal to no element of `set`.
pub fn nin_set(value: &Value, set: &[Value]) -> bool {
    !in_set(value, set)
}

/// `$keyin`: `value` (used as a string key) is a key of the `keys` object.
pub fn key_in(value: &Value, keys: &Value) -> bool {
    let Some(key) = value.as_str() else {
        return false;
    };
    matches!(keys, Value::Object(map) if map.contains_key(key))
}

pub fn nkey_in(value: &Value, keys: &Value) -> bool {
    !key_in(value, keys)
}

/// `$definedin`: `keys[value]` exists and is not null.
pub fn defined_in(value: &Value, keys: &Value) -> bool {
    let Some(key) = value.as_str() else {
        return false;
    };
    matches!(keys, Value::Object(map) if map.get(key).map(|v| !v.is_null()).unwrap_or(false))
}

/// `$undefinedin`: `keys[value]` is absent or null.
pub fn undefined_in(value: &Value, keys: &Value) -> bool {
    !defined_in(value, keys)
}

/// `$regex`: `value` is a string matching the compiled pattern.
pub fn regex_match(value: &Value, pattern: &Regex) -> bool {
    value.as_str().map(|s| pattern.is_match(s)).unwrap_or(false)
}

/// `$containsString`: `value` is a string containing `needle` as a substring.
pub fn contains_string(value: &Value, needle: &Value) -> bool {
    match (value.as_str(), needle.as_str()) {
        (Some(haystack), Some(needle)) => haystack.contains(needle),
        _ => false,
    }
}

/// `$contains`: array contains an abstract-equal element, or string
/// contains a substring.
pub fn contains(value: &Value, needle: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| eq(item, needle)),
        Value::String(_) => contains_string(value, needle),
        _ => false,
    }
}

/// `$containsAny`: array/string contains at least one of `needles`.
pub fn contains_any(value: &Value, needles: &[Value]) -> bool {
    needles.iter().any(|needle| contains(value, needle))
}

/// `$containsNone`: array/string contains none of `needles`.
pub fn contains_none(value: &Value, needles: &[Value]) -> bool {
    !contains_any(value, needles)
}

/// `$type`: the JS-style `typeof`/shape name of `value` matches `expected`.
pub fn type_match(value: &Value, expected: &str) -> bool {
    type_name(value) == expected
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `$finite`: `value` is a finite number, asserted to equal `expected`.
pub fn finite(value: &Value, expected: bool) -> bool {
    let is_finite = matches!(value, Value::Number(n) if n.as_f64().map(f64::is_finite).unwrap_or(false));
    is_finite == expected
}

/// `$size`: array length equals `expected`.
pub fn size(value: &Value, expected: u64) -> bool {
    matches!(value, Value::Array(items) if items.len() as u64 == expected)
}

/// `$len`: string length (in chars) equals `expected`.
pub fn len(value: &Value, expected: u64) -> bool {
    matches!(value, Value::String(s) if s.chars().count() as u64 == expected)
}

/// `$exists`: field presence equals `expected`. `value` is `None` when the
/// field is absent from the document.
pub fn exists(value: Option<&Value>, expected: bool) -> bool {
    value.is_some() == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn eq_is_coercive() {
        assert!(eq(&json!("10"), &json!(10)));
        assert!(!ne(&json!("10"), &json!(10)));
    }

    #[test]
    fn j_variants_are_non_coercive() {
        assert!(!jgt(&json!("10"), &json!(5), false));
        assert!(jgt(&json!(10), &json!(5), false));
    }

    #[test]
    fn between_is_inclusive() {
        assert!(between(&json!(5), &json!(1), &json!(5)));
        assert!(!between(&json!(6), &json!(1), &json!(5)));
    }

    #[test]
    fn in_and_nin_are_complementary() {
        let set = vec![json!(1), json!(2), json!(3)];
        assert!(in_set(&json!(2), &set));
        assert!(!nin_set(&json!(2), &set));
        assert!(!in_set(&json!(9), &set));
        assert!(nin_set(&json!(9), &set));
    }

    #[test]
    fn contains_checks_arrays_and_strings() {
        assert!(contains(&json!([1, 2, 3]), &json!(2)));
        assert!(!contains(&json!([1, 2, 3]), &json!(9)));
        assert!(contains(&json!("hello world"), &json!("world")));
    }

    #[test]
    fn contains_any_none() {
        let needles = vec![json!(9), json!(2)];
        assert!(contains_any(&json!([1, 2, 3]), &needles));
        assert!(!contains_none(&json!([1, 2, 3]), &needles));
        let needles = vec![json!(8), json!(9)];
        assert!(contains_none(&json!([1, 2, 3]), &needles));
    }

    #[test]
    fn type_and_finite_and_size_and_len() {
        assert!(type_match(&json!("x"), "string"));
        assert!(type_match(&json!([1]), "array"));
        assert!(finite(&json!(1.5), true));
        assert!(!finite(&json!("x"), true));
        assert!(size(&json!([1, 2, 3]), 3));
        assert!(len(&json!("abc"), 3));
    }

    #[test]
    fn exists_checks_presence_not_nullness() {
        assert!(exists(Some(&json!(null)), true));
        assert!(!exists(None, true));
        assert!(exists(None, false));
    }

    #[test]
    fn dteq_compares_parsed_timestamps() {
        assert!(dteq(
            &json!("2024-01-01T00:00:00Z"),
            &json!("2024-01-01T00:00:00Z")
        ));
        assert!(!dteq(
            &json!("2024-01-01T00:00:00Z"),
            &json!("2024-01-02T00:00:00Z")
        ));
    }
}
