//! Compiles a MongoDB-style query object into an [`Expr`] tree
//!
//! Normalization rules (spec §4.2):
//! - `{field: V}` where `V` is not an operator object means `{field: {$eq: V}}`.
//! - A query object with multiple top-level fields is an implicit `$and`
//!   of single-field sub-queries.
//! - `$not` nested inside a field's operator object negates that one
//!   field predicate; `$not`/`$and`/`$or` at the top level (or inside
//!   `$and`/`$or`/`$elemMatch`) combine whole sub-queries.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::ast::{Expr, FieldOp};
use super::error::{QueryError, QueryResult};
use super::path::CompiledPath;

/// Compiles a query object (top-level or nested) into an expression tree.
pub fn compile(query: &Value) -> QueryResult<Expr> {
    let map = match query {
        Value::Object(map) => map,
        _ => return Err(QueryError::invalid_argument("query must be a JSON object")),
    };

    if map.is_empty() {
        return Ok(Expr::And(Vec::new()));
    }

    if map.len() == 1 {
        let (key, value) = map.iter().next().unwrap();
        match key.as_str() {
            "$and" => return Ok(Expr::And(compile_array(value)?)),
            "$or" => return Ok(Expr::Or(compile_array(value)?)),
            "$not" => return Ok(Expr::Not(Box::new(compile(value)?))),
            _ if key.starts_with('$') => {
                return Err(QueryError::invalid_argument(format!(
                    "operator {} cannot appear without a field",
                    key
                )))
            }
            _ => return compile_field(CompiledPath::compile(key), value),
        }
    }

    let mut exprs = Vec::with_capacity(map.len());
    for (key, value) in map {
        if key.starts_with('$') {
            return Err(QueryError::invalid_argument(format!(
                "operator {} mixed with fields at the top level",
                key
            )));
        }
        exprs.push(compile_field(CompiledPath::compile(key), value)?);
    }
    Ok(Expr::And(exprs))
}

fn compile_array(value: &Value) -> QueryResult<Vec<Expr>> {
    let items = value
        .as_array()
        .ok_or_else(|| QueryError::invalid_argument("$and/$or require an array"))?;
    items.iter().map(compile).collect()
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$'))
}

fn compile_field(path: CompiledPath, value: &Value) -> QueryResult<Expr> {
    match value {
        Value::Object(map) if is_operator_object(map) => {
            if map.len() == 1 {
                let (op, arg) = map.iter().next().unwrap();
                if op == "$not" {
                    return Ok(Expr::Not(Box::new(compile_field(path, arg)?)));
                }
                Ok(Expr::Field(path, parse_field_op(op, arg)?))
            } else {
                let mut exprs = Vec::with_capacity(map.len());
                for (op, arg) in map {
                    if op == "$not" {
                        exprs.push(Expr::Not(Box::new(compile_field(path.clone(), arg)?)));
                    } else {
                        exprs.push(Expr::Field(path.clone(), parse_field_op(op, arg)?));
                    }
                }
                Ok(Expr::And(exprs))
            }
        }
        // Shorthand: {field: V} === {field: {$eq: V}}, including date-shaped
        // values - neither carries operator keys, so both land here.
        _ => Ok(Expr::Field(path, FieldOp::Eq(value.clone()))),
    }
}

fn as_array(value: &Value, op: &str) -> QueryResult<Vec<Value>> {
    value
        .as_array()
        .cloned()
        .ok_or_else(|| QueryError::invalid_argument(format!("{} requires an array", op)))
}

fn as_pair(value: &Value, op: &str) -> QueryResult<(Value, Value)> {
    let items = as_array(value, op)?;
    match items.as_slice() {
        [lo, hi] => Ok((lo.clone(), hi.clone())),
        _ => Err(QueryError::invalid_argument(format!(
            "{} requires a two-element array",
            op
        ))),
    }
}

fn as_u64(value: &Value, op: &str) -> QueryResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| QueryError::invalid_argument(format!("{} requires a non-negative integer", op)))
}

fn as_bool(value: &Value, op: &str) -> QueryResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| QueryError::invalid_argument(format!("{} requires a boolean", op)))
}

fn as_string(value: &Value, op: &str) -> QueryResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| QueryError::invalid_argument(format!("{} requires a string", op)))
}

fn parse_field_op(op: &str, arg: &Value) -> QueryResult<FieldOp> {
    Ok(match op {
        "$eq" => FieldOp::Eq(arg.clone()),
        "$aeq" => FieldOp::Aeq(arg.clone()),
        "$ne" => FieldOp::Ne(arg.clone()),
        "$dteq" => FieldOp::Dteq(arg.clone()),
        "$gt" => FieldOp::Gt(arg.clone()),
        "$gte" => FieldOp::Gte(arg.clone()),
        "$lt" => FieldOp::Lt(arg.clone()),
        "$lte" => FieldOp::Lte(arg.clone()),
        "$jgt" => FieldOp::Jgt(arg.clone()),
        "$jgte" => FieldOp::Jgte(arg.clone()),
        "$jlt" => FieldOp::Jlt(arg.clone()),
        "$jlte" => FieldOp::Jlte(arg.clone()),
        "$between" => {
            let (lo, hi) = as_pair(arg, op)?;
            FieldOp::Between(lo, hi)
        }
        "$jbetween" => {
            let (lo, hi) = as_pair(arg, op)?;
            FieldOp::JBetween(lo, hi)
        }
        "$in" => FieldOp::In(as_array(arg, op)?),
        "$nin" => FieldOp::Nin(as_array(arg, op)?),
        "$keyin" => FieldOp::KeyIn(arg.clone()),
        "$nkeyin" => FieldOp::NKeyIn(arg.clone()),
        "$definedin" => FieldOp::DefinedIn(arg.clone()),
        "$undefinedin" => FieldOp::UndefinedIn(arg.clone()),
        "$regex" => FieldOp::Regex(std::sync::Arc::new(compile_regex(arg)?)),
        "$containsString" => FieldOp::ContainsString(arg.clone()),
        "$contains" => FieldOp::Contains(arg.clone()),
        "$containsAny" => FieldOp::ContainsAny(as_array(arg, op)?),
        "$containsNone" => FieldOp::ContainsNone(as_array(arg, op)?),
        "$elemMatch" => FieldOp::ElemMatch(Box::new(compile(arg)?)),
        "$type" => FieldOp::Type(as_string(arg, op)?),
        "$finite" => FieldOp::Finite(as_bool(arg, op)?),
        "$size" => FieldOp::Size(as_u64(arg, op)?),
        "$len" => FieldOp::Len(as_u64(arg, op)?),
        "$exists" => FieldOp::Exists(as_bool(arg, op)?),
        _ => return Err(QueryError::invalid_argument(format!("unknown operator {}", op))),
    })
}

fn compile_regex(arg: &Value) -> QueryResult<Regex> {
    match arg {
        Value::String(pattern) => Regex::new(pattern)
            .map_err(|e| QueryError::invalid_argument(format!("invalid $regex: {}", e))),
        Value::Array(items) => match items.as_slice() {
            [Value::String(pattern), Value::String(flags)] => {
                let mut builder = RegexBuilder::new(pattern);
                builder.case_insensitive(flags.contains('i'));
                builder.multi_line(flags.contains('m'));
                builder
                    .build()
                    .map_err(|e| QueryError::invalid_argument(format!("invalid $regex: {}", e)))
            }
            _ => Err(QueryError::invalid_argument(
                "$regex array form requires [pattern, flags]",
            )),
        },
        _ => Err(QueryError::invalid_argument(
            "$regex requires a string or [pattern, flags]",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shorthand_normalizes_to_eq() {
        let expr = compile(&json!({"name": "alice"})).unwrap();
        assert!(expr.matches(&json!({"name": "alice"})));
        assert!(!expr.matches(&json!({"name": "bob"})));
    }

    #[test]
    fn multi_field_object_is_implicit_and() {
        let expr = compile(&json!({"country": "fr", "age": {"$gte": 18}})).unwrap();
        assert!(expr.matches(&json!({"country": "fr", "age": 30})));
        assert!(!expr.matches(&json!({"country": "us", "age": 30})));
        assert!(!expr.matches(&json!({"country": "fr", "age": 10})));
    }

    #[test]
    fn explicit_and_matches_same_as_multi_field() {
        let a = compile(&json!({"$and": [{"country": "fr"}, {"age": {"$gte": 18}}]})).unwrap();
        let b = compile(&json!({"country": "fr", "age": {"$gte": 18}})).unwrap();
        let doc = json!({"country": "fr", "age": 30});
        assert_eq!(a.matches(&doc), b.matches(&doc));
    }

    #[test]
    fn or_matches_any_branch() {
        let expr = compile(&json!({"$or": [{"age": {"$lt": 18}}, {"age": {"$gt": 65}}]})).unwrap();
        assert!(expr.matches(&json!({"age": 10})));
        assert!(expr.matches(&json!({"age": 70})));
        assert!(!expr.matches(&json!({"age": 30})));
    }

    #[test]
    fn not_negates_field_predicate() {
        let expr = compile(&json!({"age": {"$not": {"$gt": 18}}})).unwrap();
        assert!(expr.matches(&json!({"age": 10})));
        assert!(!expr.matches(&json!({"age": 30})));
    }

    #[test]
    fn top_level_not_negates_subquery() {
        let expr = compile(&json!({"$not": {"age": {"$gt": 18}}})).unwrap();
        assert!(expr.matches(&json!({"age": 10})));
        assert!(!expr.matches(&json!({"age": 30})));
    }

    #[test]
    fn elem_match_recurses_into_array_elements() {
        let expr = compile(&json!({"orders": {"$elemMatch": {"qty": {"$gt": 5}}}})).unwrap();
        let doc = json!({"orders": [{"qty": 1}, {"qty": 9}]});
        assert!(expr.matches(&doc));
        let doc2 = json!({"orders": [{"qty": 1}, {"qty": 2}]});
        assert!(!expr.matches(&doc2));
    }

    #[test]
    fn dotted_path_with_operator_object() {
        let expr = compile(&json!({"address.zip": {"$in": ["10001", "10002"]}})).unwrap();
        assert!(expr.matches(&json!({"address": {"zip": "10001"}})));
        assert!(!expr.matches(&json!({"address": {"zip": "99999"}})));
    }

    #[test]
    fn regex_operator_compiles_and_matches() {
        let expr = compile(&json!({"name": {"$regex": "^a.*e$"}})).unwrap();
        assert!(expr.matches(&json!({"name": "alice"})));
        assert!(!expr.matches(&json!({"name": "bob"})));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let err = compile(&json!({"name": {"$bogus": 1}})).unwrap_err();
        assert_eq!(err.code(), "LOKI_INVALID_ARGUMENT");
    }

    #[test]
    fn empty_query_matches_everything() {
        let expr = compile(&json!({})).unwrap();
        assert!(expr.matches(&json!({"anything": true})));
    }
}
