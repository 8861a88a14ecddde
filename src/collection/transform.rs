//! Named, parameterizable Resultset pipelines (spec.md §4.4 "Transforms")
//!
//! A transform is a stored sequence of [`TransformStep`]s. Running one
//! clones the steps, substitutes `[%lktxp]<name>` tokens against the
//! caller-supplied parameters, then replays the steps against a fresh
//! [`Resultset`](crate::resultset::Resultset) in order.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::query::WherePredicate;

const TOKEN_PREFIX: &str = "[%lktxp]";

/// One step of a stored transform pipeline.
#[derive(Clone)]
pub enum TransformStep {
    Find(Value),
    Where(WherePredicate),
    Simplesort { property: String, descending: bool },
    Compoundsort(Vec<(String, bool)>),
    Limit(usize),
    Offset(usize),
    Update(Arc<dyn Fn(&mut Value) + Send + Sync>),
    Remove,
}

impl std::fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformStep::Find(q) => write!(f, "Find({})", q),
            TransformStep::Where(_) => write!(f, "Where(..)"),
            TransformStep::Simplesort { property, descending } => {
                write!(f, "Simplesort({}, desc={})", property, descending)
            }
            TransformStep::Compoundsort(props) => write!(f, "Compoundsort({:?})", props),
            TransformStep::Limit(n) => write!(f, "Limit({})", n),
            TransformStep::Offset(n) => write!(f, "Offset({})", n),
            TransformStep::Update(_) => write!(f, "Update(..)"),
            TransformStep::Remove => write!(f, "Remove"),
        }
    }
}

/// Recursively substitutes `[%lktxp]<name>` string tokens in a JSON value
/// using the caller-supplied parameter map. Non-matching strings, and
/// non-string/non-container values, pass through unchanged.
pub fn substitute_params(value: &Value, params: &HashMap<String, Value>) -> Value {
    match value {
        Value::String(s) => {
            if let Some(name) = s.strip_prefix(TOKEN_PREFIX) {
                params.get(name).cloned().unwrap_or_else(|| value.clone())
            } else {
                value.clone()
            }
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute_params(v, params)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_params(v, params)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Applies parameter substitution to the steps of a transform that carry
/// JSON payloads (`Find`). Steps without a JSON payload pass through.
pub fn substitute_steps(steps: &[TransformStep], params: &HashMap<String, Value>) -> Vec<TransformStep> {
    steps
        .iter()
        .map(|step| match step {
            TransformStep::Find(q) => TransformStep::Find(substitute_params(q, params)),
            other => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_top_level_token() {
        let mut params = HashMap::new();
        params.insert("minAge".to_string(), json!(18));
        let query = json!({"age": {"$gte": "[%lktxp]minAge"}});
        let substituted = substitute_params(&query, &params);
        assert_eq!(substituted, json!({"age": {"$gte": 18}}));
    }

    #[test]
    fn unmatched_token_passes_through_unchanged() {
        let params = HashMap::new();
        let query = json!({"age": {"$gte": "[%lktxp]minAge"}});
        let substituted = substitute_params(&query, &params);
        assert_eq!(substituted, query);
    }

    #[test]
    fn non_token_strings_are_untouched() {
        let params = HashMap::new();
        let query = json!({"name": "alice"});
        assert_eq!(substitute_params(&query, &params), query);
    }

    #[test]
    fn substitute_steps_only_rewrites_find_payloads() {
        let params = HashMap::from([("x".to_string(), json!(5))]);
        let steps = vec![
            TransformStep::Find(json!({"a": "[%lktxp]x"})),
            TransformStep::Limit(2),
        ];
        let rewritten = substitute_steps(&steps, &params);
        match &rewritten[0] {
            TransformStep::Find(q) => assert_eq!(q, &json!({"a": 5})),
            _ => panic!("expected Find"),
        }
    }
}
