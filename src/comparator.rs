//! The value comparator
//!
//! A single total order over heterogeneous JSON values. It is the sole
//! source of truth for every sorted structure in the crate - binary
//! indices, `simplesort`/`compoundsort`, and range queries all derive
//! their ordering from [`Comparator::compare`]. Using anything else for
//! one of those paths would desynchronize indices from query results.
//!
//! Tiered ordering (least to greatest):
//! `null`/missing < NaN < `false` < `true` < `""` < everything else.
//! Within the final tier, values compare numerically if both coerce to a
//! finite number, otherwise lexicographically on their string form.

use std::cmp::Ordering;

use serde_json::Value;

/// Namespace for the value comparator's primitives.
pub struct Comparator;

impl Comparator {
    /// Three-way compare of two values under the tiered total order.
    pub fn compare(a: &Value, b: &Value) -> Ordering {
        let (ta, tb) = (tier(a), tier(b));
        if ta != tb {
            return ta.cmp(&tb);
        }
        match ta {
            // null, NaN, false, true, "" are each a single fixed point.
            0..=4 => Ordering::Equal,
            _ => compare_general(a, b),
        }
    }

    /// Abstract equality: `compare(a, b) == Equal`.
    pub fn aeq(a: &Value, b: &Value) -> bool {
        Self::compare(a, b) == Ordering::Equal
    }

    /// `a < b`, or `a <= b` when `or_equal` is set.
    pub fn lt(a: &Value, b: &Value, or_equal: bool) -> bool {
        match Self::compare(a, b) {
            Ordering::Less => true,
            Ordering::Equal => or_equal,
            Ordering::Greater => false,
        }
    }

    /// `a > b`, or `a >= b` when `or_equal` is set.
    pub fn gt(a: &Value, b: &Value, or_equal: bool) -> bool {
        match Self::compare(a, b) {
            Ordering::Greater => true,
            Ordering::Equal => or_equal,
            Ordering::Less => false,
        }
    }
}

/// Classifies a value into one of the fixed tiers, or 5 ("other").
fn tier(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Number(n) if n.as_f64().map(f64::is_nan).unwrap_or(false) => 1,
        Value::Bool(false) => 2,
        Value::Bool(true) => 3,
        Value::String(s) if s.is_empty() => 4,
        _ => 5,
    }
}

/// Compares two "other" values: numeric coercion first, then lexicographic
/// comparison of their string form.
fn compare_general(a: &Value, b: &Value) -> Ordering {
    match (coerce_f64(a), coerce_f64(b)) {
        (Some(af), Some(bf)) => af.partial_cmp(&bf).unwrap_or(Ordering::Equal),
        _ => coerce_string(a).cmp(&coerce_string(b)),
    }
}

/// Attempts to coerce a value to a finite `f64`, the way `Number(x)` would
/// in a dynamically typed comparator - returns `None` (the "NaN" case) on
/// failure.
fn coerce_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        _ => None,
    }
}

/// Coerces a value to its string form for lexicographic fallback
/// comparison. Arrays/objects get a canonical JSON rendering; that is
/// only ever used to break ties deterministically, never to imply a
/// meaningful collation.
fn coerce_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => v.to_string(),
    }
}
