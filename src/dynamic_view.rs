//! DynamicView: a persistent, auto-maintained filtered/sorted projection
//! (spec.md §4.6)
//!
//! A view does not hold a reference to its collection - that would make
//! [`Collection`](crate::collection::Collection) self-referential. Instead
//! the collection calls [`DynamicView::evaluate_document`] /
//! [`DynamicView::remove_document`] on every mutation, passing just the
//! affected document(s); the view owns only its filter pipeline, sort
//! criteria, and the `positions` it currently matches.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use crate::comparator::Comparator;
use crate::query::{CompiledPath, Query};

/// How a view orders its matched positions.
#[derive(Clone)]
pub enum SortCriteria {
    Unsorted,
    Simple(CompiledPath, bool),
    Compound(Vec<(CompiledPath, bool)>),
    Custom(Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>),
}

impl std::fmt::Debug for SortCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortCriteria::Unsorted => write!(f, "Unsorted"),
            SortCriteria::Simple(p, desc) => write!(f, "Simple({}, desc={})", p.as_str(), desc),
            SortCriteria::Compound(props) => {
                write!(f, "Compound({:?})", props.iter().map(|(p, d)| (p.as_str(), *d)).collect::<Vec<_>>())
            }
            SortCriteria::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

fn compare_by(a: &Value, b: &Value, sort: &SortCriteria) -> Ordering {
    match sort {
        SortCriteria::Unsorted => Ordering::Equal,
        SortCriteria::Simple(path, descending) => {
            let ord = Comparator::compare(&path.get_scalar(a), &path.get_scalar(b));
            if *descending {
                ord.reverse()
            } else {
                ord
            }
        }
        SortCriteria::Compound(props) => {
            for (path, descending) in props {
                let ord = Comparator::compare(&path.get_scalar(a), &path.get_scalar(b));
                let ord = if *descending { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        }
        SortCriteria::Custom(cmp) => cmp(a, b),
    }
}

/// A persistent, auto-maintained filtered/sorted view over a collection.
#[derive(Debug, Clone)]
pub struct DynamicView {
    name: String,
    filters: Vec<Query>,
    sort: SortCriteria,
    positions: Vec<usize>,
    sort_dirty: bool,
}

impl DynamicView {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filters: Vec::new(),
            sort: SortCriteria::Unsorted,
            positions: Vec::new(),
            sort_dirty: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a `find`-style filter clause to the pipeline.
    pub fn apply_find(&mut self, query: Query) {
        self.filters.push(query);
    }

    /// Appends a `$where`-style filter clause to the pipeline.
    pub fn apply_where<F>(&mut self, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Query::where_fn(predicate));
    }

    pub fn apply_simple_sort(&mut self, property: &str, descending: bool) {
        self.sort = SortCriteria::Simple(CompiledPath::compile(property), descending);
        self.sort_dirty = true;
    }

    pub fn apply_sort_criteria(&mut self, props: Vec<(String, bool)>) {
        self.sort = SortCriteria::Compound(
            props
                .into_iter()
                .map(|(p, d)| (CompiledPath::compile(&p), d))
                .collect(),
        );
        self.sort_dirty = true;
    }

    pub fn apply_custom_sort<F>(&mut self, cmp: F)
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.sort = SortCriteria::Custom(Arc::new(cmp));
        self.sort_dirty = true;
    }

    /// Clears the filter pipeline. Positions are not recomputed until the
    /// next [`DynamicView::rematerialize`].
    pub fn remove_filter(&mut self) {
        self.filters.clear();
    }

    fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|q| q.matches(doc))
    }

    /// Full rebuild from scratch: re-tests every document and, if sorted,
    /// re-sorts from zero. Used on construction, after `remove_filter`,
    /// and on transaction rollback.
    pub fn rematerialize(&mut self, data: &[Value]) {
        self.positions = data
            .iter()
            .enumerate()
            .filter(|(_, doc)| self.matches(doc))
            .map(|(i, _)| i)
            .collect();
        self.resort(data);
        self.sort_dirty = false;
    }

    /// Notification hook: a document at `position` was inserted (`is_new`)
    /// or updated. Re-tests it against the filter pipeline and updates
    /// membership accordingly.
    pub fn evaluate_document(&mut self, data: &[Value], position: usize, is_new: bool) {
        let doc = &data[position];
        let is_member = self.positions.contains(&position);
        let should_be_member = self.matches(doc);

        if should_be_member && !is_member {
            self.insert_position(data, position);
        } else if !should_be_member && is_member {
            self.positions.retain(|&p| p != position);
        } else if should_be_member && is_member && !is_new {
            // Value may have changed in a way that moves its sort position.
            self.sort_dirty = true;
        }
    }

    fn insert_position(&mut self, data: &[Value], position: usize) {
        match &self.sort {
            SortCriteria::Unsorted => self.positions.push(position),
            _ => {
                let doc = &data[position];
                let at = self
                    .positions
                    .partition_point(|&p| compare_by(&data[p], doc, &self.sort) != Ordering::Greater);
                self.positions.insert(at, position);
            }
        }
    }

    /// Notification hook: the positions in `removed` (already removed
    /// from the collection's `data`) are dropped from this view, and
    /// every surviving position greater than a removed one is shifted
    /// down to account for the compaction.
    pub fn remove_document(&mut self, removed: &[usize]) {
        if removed.is_empty() {
            return;
        }
        let mut sorted_removed = removed.to_vec();
        sorted_removed.sort_unstable();
        self.positions.retain(|p| sorted_removed.binary_search(p).is_err());
        for p in self.positions.iter_mut() {
            let shift = sorted_removed.partition_point(|&rp| rp < *p);
            *p -= shift;
        }
    }

    fn resort(&mut self, data: &[Value]) {
        if matches!(self.sort, SortCriteria::Unsorted) {
            return;
        }
        self.positions.sort_by(|&a, &b| compare_by(&data[a], &data[b], &self.sort));
    }

    /// Materializes matched documents, applying a pending sort if dirty.
    pub fn data(&mut self, data: &[Value]) -> Vec<Value> {
        if self.sort_dirty {
            self.resort(data);
            self.sort_dirty = false;
        }
        self.positions.iter().map(|&p| data[p].clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({"name": "a", "age": 30, "country": "fr"}),
            json!({"name": "b", "age": 25, "country": "fr"}),
            json!({"name": "c", "age": 40, "country": "us"}),
        ]
    }

    #[test]
    fn rematerialize_applies_filter_pipeline() {
        let data = sample();
        let mut view = DynamicView::new("fr_only");
        view.apply_find(Query::compile(&json!({"country": "fr"})).unwrap());
        view.rematerialize(&data);
        let names: Vec<Value> = view.data(&data).iter().map(|d| d["name"].clone()).collect();
        assert_eq!(names, vec![json!("a"), json!("b")]);
    }

    #[test]
    fn evaluate_document_adds_matching_insert() {
        let mut data = sample();
        let mut view = DynamicView::new("fr_only");
        view.apply_find(Query::compile(&json!({"country": "fr"})).unwrap());
        view.rematerialize(&data);

        data.push(json!({"name": "d", "age": 22, "country": "fr"}));
        let new_pos = data.len() - 1;
        view.evaluate_document(&data, new_pos, true);
        assert_eq!(view.count(), 3);
    }

    #[test]
    fn evaluate_document_drops_non_matching_update() {
        let mut data = sample();
        let mut view = DynamicView::new("fr_only");
        view.apply_find(Query::compile(&json!({"country": "fr"})).unwrap());
        view.rematerialize(&data);

        data[0] = json!({"name": "a", "age": 30, "country": "us"});
        view.evaluate_document(&data, 0, false);
        assert_eq!(view.count(), 1);
    }

    #[test]
    fn sorted_view_inserts_at_correct_position() {
        let data = sample();
        let mut view = DynamicView::new("by_age");
        view.apply_simple_sort("age", false);
        view.rematerialize(&data);
        let ages: Vec<Value> = view.data(&data).iter().map(|d| d["age"].clone()).collect();
        assert_eq!(ages, vec![json!(25), json!(30), json!(40)]);
    }

    #[test]
    fn remove_document_shifts_remaining_positions() {
        let mut data = sample();
        let mut view = DynamicView::new("all");
        view.rematerialize(&data);

        data.remove(1);
        view.remove_document(&[1]);
        assert_eq!(view.positions(), &[0, 1]);
    }

    #[test]
    fn remove_filter_keeps_stale_positions_until_rematerialize() {
        let data = sample();
        let mut view = DynamicView::new("fr_only");
        view.apply_find(Query::compile(&json!({"country": "fr"})).unwrap());
        view.rematerialize(&data);
        view.remove_filter();
        assert_eq!(view.count(), 2);
        view.rematerialize(&data);
        assert_eq!(view.count(), 3);
    }
}
