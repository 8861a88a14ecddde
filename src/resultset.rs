//! Resultset: a chainable, lazily-filtered view over a collection (spec.md §4.5)
//!
//! Holds an immutable reference to its collection - or, after `eq_join`/
//! `map`, an owned anonymous collection built from the join/map output -
//! plus the positions currently selected. `find`/`where_fn`/`sort`/
//! `simplesort`/`compoundsort`/`limit`/`offset` chain by value, consuming
//! and returning a `Resultset`. Terminal `update`/`remove` are deliberately
//! not methods here: a `Resultset` only ever borrows its collection
//! immutably, so mutation is left to the caller via `resolved_positions()`
//! against `Collection::update_by_positions`/`remove_batch_by_positions`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::collection::{Collection, CollectionOptions, CollectionResult};
use crate::comparator::Comparator;
use crate::index::RangeOp;
use crate::query::{CompiledPath, FieldOp, Query, QueryResult};

/// Selectivity above which an index-backed `find` switches from a plain
/// range scan to an intersection against the current working set.
const INTERSECTION_THRESHOLD: f64 = 0.25;

enum Bound<'a> {
    Borrowed(&'a Collection),
    Owned(Box<Collection>),
}

impl<'a> Bound<'a> {
    fn collection(&self) -> &Collection {
        match self {
            Bound::Borrowed(c) => c,
            Bound::Owned(c) => c,
        }
    }
}

/// A chainable query pipeline over a collection's documents.
pub struct Resultset<'a> {
    bound: Bound<'a>,
    filtered_rows: Vec<usize>,
    initialized: bool,
}

impl<'a> Resultset<'a> {
    /// Begins an unfiltered pipeline over every document in `collection`.
    pub fn new(collection: &'a Collection) -> Self {
        Self {
            bound: Bound::Borrowed(collection),
            filtered_rows: Vec::new(),
            initialized: false,
        }
    }

    /// Begins a pipeline already narrowed to `positions` - used by
    /// [`Collection::apply_transform`](crate::collection::Collection::apply_transform)
    /// to carry a transform's running position set between steps.
    pub(crate) fn seeded(collection: &'a Collection, positions: Vec<usize>) -> Self {
        Self {
            bound: Bound::Borrowed(collection),
            filtered_rows: positions,
            initialized: true,
        }
    }

    fn from_owned(collection: Collection, positions: Vec<usize>) -> Resultset<'static> {
        Resultset {
            bound: Bound::Owned(Box::new(collection)),
            filtered_rows: positions,
            initialized: true,
        }
    }

    fn collection(&self) -> &Collection {
        self.bound.collection()
    }

    fn current_or_all(&self) -> Vec<usize> {
        if self.initialized {
            self.filtered_rows.clone()
        } else {
            (0..self.collection().len()).collect()
        }
    }

    /// The data positions this pipeline currently selects, in order.
    pub fn resolved_positions(&self) -> Vec<usize> {
        self.current_or_all()
    }

    /// Materializes the matched documents in their current order.
    pub fn data(&self) -> Vec<Value> {
        let data = self.collection().data();
        self.current_or_all().iter().map(|&p| data[p].clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.current_or_all().len()
    }

    /// Applies a MongoDB-style query object, narrowing (or, on the first
    /// call, establishing) the selected rows.
    pub fn find(self, query: &Value) -> QueryResult<Self> {
        let compiled = Query::compile(query)?;
        Ok(self.find_query(compiled))
    }

    /// Applies an already-compiled query.
    pub fn find_query(mut self, query: Query) -> Self {
        if !self.initialized {
            self.filtered_rows = match self.try_indexed(&query) {
                Some(positions) => positions,
                None => {
                    let data = self.collection().data();
                    (0..data.len()).filter(|&p| query.matches(&data[p])).collect()
                }
            };
            self.initialized = true;
            return self;
        }

        if let Some(positions) = self.try_indexed(&query) {
            let total = self.collection().len().max(1);
            let selectivity = positions.len() as f64 / total as f64;
            if selectivity <= INTERSECTION_THRESHOLD {
                let current: HashSet<usize> = self.filtered_rows.iter().copied().collect();
                self.filtered_rows = positions.into_iter().filter(|p| current.contains(p)).collect();
                return self;
            }
        }

        let data = self.collection().data();
        self.filtered_rows.retain(|&p| query.matches(&data[p]));
        self
    }

    /// If `query` is a single field-scoped operator serviceable by a clean
    /// binary index on that field, resolves it directly against the index.
    fn try_indexed(&self, query: &Query) -> Option<Vec<usize>> {
        let (path, op) = query.expr().as_single_field()?;
        if !path.is_simple() {
            return None;
        }
        let range = to_range_op(op)?;
        self.collection().indexed_range(path.as_str(), &range)
    }

    /// Applies a `$where`-style predicate.
    pub fn where_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool,
    {
        let data = self.collection().data();
        let rows = self.current_or_all();
        self.filtered_rows = rows.into_iter().filter(|&p| predicate(&data[p])).collect();
        self.initialized = true;
        self
    }

    pub fn simplesort(mut self, property: &str, descending: bool) -> Self {
        let path = CompiledPath::compile(property);
        let data = self.collection().data();
        let mut rows = self.current_or_all();
        rows.sort_by(|&a, &b| {
            let ord = Comparator::compare(&path.get_scalar(&data[a]), &path.get_scalar(&data[b]));
            if descending {
                ord.reverse()
            } else {
                ord
            }
        });
        self.filtered_rows = rows;
        self.initialized = true;
        self
    }

    pub fn compoundsort(mut self, properties: &[(String, bool)]) -> Self {
        let paths: Vec<(CompiledPath, bool)> = properties
            .iter()
            .map(|(p, d)| (CompiledPath::compile(p), *d))
            .collect();
        let data = self.collection().data();
        let mut rows = self.current_or_all();
        rows.sort_by(|&a, &b| {
            for (path, descending) in &paths {
                let ord = Comparator::compare(&path.get_scalar(&data[a]), &path.get_scalar(&data[b]));
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
        self.filtered_rows = rows;
        self.initialized = true;
        self
    }

    /// Sorts by a caller-supplied comparator.
    pub fn sort<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering,
    {
        let data = self.collection().data();
        let mut rows = self.current_or_all();
        rows.sort_by(|&a, &b| compare(&data[a], &data[b]));
        self.filtered_rows = rows;
        self.initialized = true;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        let rows = self.current_or_all();
        self.filtered_rows = rows.into_iter().take(n).collect();
        self.initialized = true;
        self
    }

    pub fn offset(mut self, n: usize) -> Self {
        let rows = self.current_or_all();
        self.filtered_rows = rows.into_iter().skip(n).collect();
        self.initialized = true;
        self
    }

    /// Unions the current rows with whatever else in the collection
    /// matches `query`.
    pub fn find_or(mut self, query: &Value) -> QueryResult<Self> {
        let compiled = Query::compile(query)?;
        let existing = self.current_or_all();
        let data = self.collection().data();
        let mut seen: HashSet<usize> = existing.iter().copied().collect();
        let mut rows = existing;
        for (i, doc) in data.iter().enumerate() {
            if !seen.contains(&i) && compiled.matches(doc) {
                seen.insert(i);
                rows.push(i);
            }
        }
        self.filtered_rows = rows;
        self.initialized = true;
        Ok(self)
    }

    /// Intersects the current rows with `query` - the named counterpart to
    /// [`Resultset::find_or`]; equivalent to chaining `.find(query)`.
    pub fn find_and(self, query: &Value) -> QueryResult<Self> {
        self.find(query)
    }

    /// Joins the current rows against `right` on `left_key`/`right_key`,
    /// merging matched pairs with `right_`-prefixed fields from `right`.
    pub fn eq_join(self, right: &Collection, left_key: &str, right_key: &str) -> CollectionResult<Resultset<'static>> {
        self.eq_join_with(right, left_key, right_key, |l, r| {
            let mut out = l.clone();
            if let (Value::Object(out_map), Value::Object(r_map)) = (&mut out, r) {
                for (k, v) in r_map {
                    out_map.insert(format!("right_{k}"), v.clone());
                }
            }
            out
        })
    }

    /// As [`Resultset::eq_join`], with a caller-supplied row combiner.
    ///
    /// Builds a hash of `right` keyed by `right_key` once, then looks up
    /// each left row's `left_key` against it - one matched right document
    /// per left row (last-wins on duplicate right keys), not a nested-loop
    /// cross product.
    pub fn eq_join_with<F>(
        self,
        right: &Collection,
        left_key: &str,
        right_key: &str,
        combine: F,
    ) -> CollectionResult<Resultset<'static>>
    where
        F: Fn(&Value, &Value) -> Value,
    {
        let left_path = CompiledPath::compile(left_key);
        let right_path = CompiledPath::compile(right_key);
        let left_data = self.collection().data();
        let rows = self.current_or_all();

        let mut right_by_key: HashMap<String, &Value> = HashMap::new();
        for right_doc in right.data() {
            let key = right_path.get_scalar(right_doc);
            if key == Value::Null {
                continue;
            }
            right_by_key.insert(join_key(&key), right_doc);
        }

        let mut joined = Vec::new();
        for &lp in &rows {
            let left_doc = &left_data[lp];
            let left_value = left_path.get_scalar(left_doc);
            if left_value == Value::Null {
                continue;
            }
            if let Some(right_doc) = right_by_key.get(&join_key(&left_value)) {
                joined.push(combine(left_doc, right_doc));
            }
        }

        let mut out = Collection::new("$join", CollectionOptions::default());
        let count = joined.len();
        out.insert_many(joined)?;
        Ok(Resultset::from_owned(out, (0..count).collect()))
    }

    /// Transforms every matched document through `f`, producing a fresh
    /// anonymous collection of the results.
    pub fn map<F>(self, f: F) -> CollectionResult<Resultset<'static>>
    where
        F: Fn(&Value) -> Value,
    {
        let data = self.collection().data();
        let mapped: Vec<Value> = self.current_or_all().iter().map(|&p| f(&data[p])).collect();
        let mut out = Collection::new("$map", CollectionOptions::default());
        let count = mapped.len();
        out.insert_many(mapped)?;
        Ok(Resultset::from_owned(out, (0..count).collect()))
    }

    /// Reduces the matched documents: `m` maps each to an intermediate
    /// value, `r` folds the mapped sequence into the final result.
    pub fn map_reduce<M, R, T, U>(&self, m: M, r: R) -> U
    where
        M: Fn(&Value) -> T,
        R: Fn(Vec<T>) -> U,
    {
        let data = self.collection().data();
        let mapped: Vec<T> = self.current_or_all().iter().map(|&p| m(&data[p])).collect();
        r(mapped)
    }
}

/// Canonical hashable form of a join key. `serde_json`'s object-key
/// ordering is stable per-value, so structurally equal values always hash
/// the same way.
fn join_key(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn to_range_op(op: &FieldOp) -> Option<RangeOp<'_>> {
    match op {
        FieldOp::Eq(v) | FieldOp::Aeq(v) | FieldOp::Dteq(v) => Some(RangeOp::Eq(v)),
        FieldOp::Gt(v) => Some(RangeOp::Gt(v)),
        FieldOp::Gte(v) => Some(RangeOp::Gte(v)),
        FieldOp::Lt(v) => Some(RangeOp::Lt(v)),
        FieldOp::Lte(v) => Some(RangeOp::Lte(v)),
        FieldOp::Between(lo, hi) => Some(RangeOp::Between(lo, hi)),
        FieldOp::In(set) => Some(RangeOp::In(set)),
        _ => None,
    }
}
