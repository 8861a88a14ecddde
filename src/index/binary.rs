//! `BinaryIndex`: a sorted permutation of data positions
//!
//! `values[i]` is a position into the owning collection's `data`; the
//! sequence `(data[values[i]].property)` is non-decreasing under the
//! [`Comparator`]. The index never owns the documents it orders - every
//! operation takes a `key` closure that resolves a data position to its
//! indexed value, so the index stays agnostic to how the collection
//! stores documents.
//!
//! Maintenance is either lazy (mutations flip `dirty`; [`BinaryIndex::ensure`]
//! rebuilds on next use) or adaptive (every insert/remove is applied
//! incrementally via binary search, per spec.md §4.3).

use serde_json::Value;

use crate::comparator::Comparator;

/// A range-query operator serviceable by a binary index.
#[derive(Debug, Clone)]
pub enum RangeOp<'a> {
    Eq(&'a Value),
    Gt(&'a Value),
    Gte(&'a Value),
    Lt(&'a Value),
    Lte(&'a Value),
    Between(&'a Value, &'a Value),
    In(&'a [Value]),
}

/// A sorted index of data positions over one property.
#[derive(Debug, Clone)]
pub struct BinaryIndex {
    property: String,
    values: Vec<usize>,
    dirty: bool,
}

impl BinaryIndex {
    /// Creates an empty, dirty index - it will rebuild on first use.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            values: Vec::new(),
            dirty: true,
        }
    }

    /// Creates an empty, clean index - an empty sequence is trivially
    /// sorted, so adaptive maintenance can apply every subsequent
    /// insert/update/remove incrementally from the start instead of
    /// waiting for a caller to trigger a full rebuild.
    pub fn new_adaptive(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            values: Vec::new(),
            dirty: false,
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// The sorted position sequence. Only meaningful when `!is_dirty()`.
    pub fn values(&self) -> &[usize] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rebuilds from scratch: sorts `[0, len)` by `key` under the comparator.
    pub fn rebuild<F>(&mut self, len: usize, key: F)
    where
        F: Fn(usize) -> Value,
    {
        let mut values: Vec<usize> = (0..len).collect();
        values.sort_by(|&a, &b| Comparator::compare(&key(a), &key(b)));
        self.values = values;
        self.dirty = false;
    }

    /// Rebuilds only if dirty, unless `force` is set (spec.md `ensureIndex`).
    pub fn ensure<F>(&mut self, len: usize, force: bool, key: F)
    where
        F: Fn(usize) -> Value,
    {
        if force || self.dirty {
            self.rebuild(len, key);
        }
    }

    /// Validates monotonicity, either fully or by sampling random adjacent
    /// pairs. Returns `true` iff every pair checked is non-decreasing.
    pub fn check<F>(&self, key: F, random_sampling: bool, sampling_factor: f64) -> bool
    where
        F: Fn(usize) -> Value,
    {
        if self.values.len() < 2 {
            return true;
        }
        if !random_sampling {
            return self
                .values
                .windows(2)
                .all(|w| !Comparator::gt(&key(w[0]), &key(w[1]), false));
        }
        let sample_count = ((self.values.len() as f64) * sampling_factor).ceil() as usize;
        let sample_count = sample_count.max(1).min(self.values.len() - 1);
        use rand::Rng;
        let mut rng = rand::thread_rng();
        (0..sample_count).all(|_| {
            let i = rng.gen_range(0..self.values.len() - 1);
            !Comparator::gt(&key(self.values[i]), &key(self.values[i + 1]), false)
        })
    }

    /// Adaptively inserts a freshly-appended data position at its sorted
    /// slot.
    pub fn insert_adaptive<F>(&mut self, position: usize, key: &F)
    where
        F: Fn(usize) -> Value,
    {
        if self.dirty {
            return;
        }
        let value = key(position);
        let at = self.lower_bound(&value, key);
        self.values.insert(at, position);
    }

    /// Adaptively removes one data position (whose key was `value` before
    /// removal), then shifts every stored position greater than it down
    /// by one to account for the compaction in `data`.
    pub fn remove_adaptive<F>(&mut self, position: usize, value: &Value, key: &F)
    where
        F: Fn(usize) -> Value,
    {
        if self.dirty {
            return;
        }
        let lo = self.lower_bound(value, key);
        let hi = self.upper_bound(value, key);
        let found = self.values[lo..hi.min(self.values.len())]
            .iter()
            .position(|&p| p == position)
            .map(|offset| lo + offset)
            .or_else(|| self.values.iter().position(|&p| p == position));
        if let Some(idx) = found {
            self.values.remove(idx);
        }
        for p in self.values.iter_mut() {
            if *p > position {
                *p -= 1;
            }
        }
    }

    /// Re-sorts one already-present position after an in-place document
    /// update: drops its old slot (looked up via its pre-update value)
    /// and re-inserts at the slot its new value sorts to. Unlike
    /// [`BinaryIndex::remove_adaptive`], no other stored position is
    /// shifted - the document didn't move in `data`, only its key changed.
    pub fn reposition_adaptive<F>(&mut self, position: usize, old_value: &Value, key: &F)
    where
        F: Fn(usize) -> Value,
    {
        if self.dirty {
            return;
        }
        let lo = self.lower_bound(old_value, key);
        let hi = self.upper_bound(old_value, key);
        let found = self.values[lo..hi.min(self.values.len())]
            .iter()
            .position(|&p| p == position)
            .map(|offset| lo + offset)
            .or_else(|| self.values.iter().position(|&p| p == position));
        if let Some(idx) = found {
            self.values.remove(idx);
        }
        self.insert_adaptive(position, key);
    }

    /// Batch-removes a set of data positions in a single pass, computing
    /// each survivor's position shift from how many removed positions
    /// preceded it. `removed` need not be sorted.
    pub fn remove_batch(&mut self, removed: &[usize]) {
        if self.dirty || removed.is_empty() {
            return;
        }
        let mut sorted_removed = removed.to_vec();
        sorted_removed.sort_unstable();
        let removed_set: std::collections::HashSet<usize> = sorted_removed.iter().copied().collect();

        let mut new_values = Vec::with_capacity(self.values.len().saturating_sub(removed.len()));
        for &p in &self.values {
            if removed_set.contains(&p) {
                continue;
            }
            let shift = sorted_removed.partition_point(|&rp| rp < p);
            new_values.push(p - shift);
        }
        self.values = new_values;
    }

    /// Resolves a range-eligible operator to the matching data positions,
    /// in index order. Empty result for a range with no members.
    pub fn calculate_range<F>(&self, op: &RangeOp, key: &F) -> Vec<usize>
    where
        F: Fn(usize) -> Value,
    {
        match op {
            RangeOp::Eq(v) => self.eq_positions(v, key),
            RangeOp::Gt(v) => {
                let at = self.upper_bound(v, key);
                self.values[at..].to_vec()
            }
            RangeOp::Gte(v) => {
                let at = self.lower_bound(v, key);
                self.values[at..].to_vec()
            }
            RangeOp::Lt(v) => {
                let at = self.lower_bound(v, key);
                self.values[..at].to_vec()
            }
            RangeOp::Lte(v) => {
                let at = self.upper_bound(v, key);
                self.values[..at].to_vec()
            }
            RangeOp::Between(lo, hi) => {
                let l = self.lower_bound(lo, key);
                let h = self.upper_bound(hi, key);
                if l < h {
                    self.values[l..h].to_vec()
                } else {
                    Vec::new()
                }
            }
            RangeOp::In(set) => {
                let mut out = Vec::new();
                for v in *set {
                    out.extend(self.eq_positions(v, key));
                }
                out
            }
        }
    }

    fn eq_positions<F>(&self, value: &Value, key: &F) -> Vec<usize>
    where
        F: Fn(usize) -> Value,
    {
        let lo = self.lower_bound(value, key);
        let hi = self.upper_bound(value, key);
        if lo < hi {
            self.values[lo..hi].to_vec()
        } else {
            Vec::new()
        }
    }

    /// First index in `values` whose key is `>= value`.
    fn lower_bound<F>(&self, value: &Value, key: &F) -> usize
    where
        F: Fn(usize) -> Value,
    {
        self.values
            .partition_point(|&p| Comparator::lt(&key(p), value, false))
    }

    /// First index in `values` whose key is `> value`.
    fn upper_bound<F>(&self, value: &Value, key: &F) -> usize
    where
        F: Fn(usize) -> Value,
    {
        self.values
            .partition_point(|&p| !Comparator::gt(&key(p), value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Vec<Value> {
        vec![json!(30), json!(25), json!(40), json!(25), json!(10)]
    }

    fn key(data: &[Value]) -> impl Fn(usize) -> Value + '_ {
        move |i| data[i].clone()
    }

    #[test]
    fn rebuild_sorts_positions_by_key() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        let ordered: Vec<Value> = idx.values().iter().map(|&p| d[p].clone()).collect();
        assert_eq!(ordered, vec![json!(10), json!(25), json!(25), json!(30), json!(40)]);
        assert!(!idx.is_dirty());
    }

    #[test]
    fn eq_range_returns_all_matching_positions() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        let mut positions = idx.calculate_range(&RangeOp::Eq(&json!(25)), &key(&d));
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 3]);
    }

    #[test]
    fn gt_and_gte_edge_policies() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));

        // found key: 25 appears twice.
        let gt: Vec<Value> = idx
            .calculate_range(&RangeOp::Gt(&json!(25)), &key(&d))
            .iter()
            .map(|&p| d[p].clone())
            .collect();
        assert!(gt.iter().all(|v| Comparator::gt(v, &json!(25), false)));

        let gte: Vec<Value> = idx
            .calculate_range(&RangeOp::Gte(&json!(25)), &key(&d))
            .iter()
            .map(|&p| d[p].clone())
            .collect();
        assert_eq!(gte.len(), gt.len() + 2);

        // hole: no document has age 26.
        let gt_hole = idx.calculate_range(&RangeOp::Gt(&json!(26)), &key(&d));
        let gte_hole = idx.calculate_range(&RangeOp::Gte(&json!(26)), &key(&d));
        assert_eq!(gt_hole, gte_hole);
    }

    #[test]
    fn between_is_inclusive_both_ends() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        let positions = idx.calculate_range(&RangeOp::Between(&json!(25), &json!(30)), &key(&d));
        let mut values: Vec<Value> = positions.iter().map(|&p| d[p].clone()).collect();
        values.sort_by(Comparator::compare);
        assert_eq!(values, vec![json!(25), json!(25), json!(30)]);
    }

    #[test]
    fn in_aggregates_per_value_eq_ranges() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        let set = vec![json!(10), json!(40)];
        let mut positions = idx.calculate_range(&RangeOp::In(&set), &key(&d));
        positions.sort_unstable();
        let values: Vec<Value> = positions.iter().map(|&p| d[p].clone()).collect();
        assert_eq!(values, vec![json!(10), json!(40)]);
    }

    #[test]
    fn out_of_bounds_value_short_circuits() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        assert!(idx.calculate_range(&RangeOp::Lt(&json!(0)), &key(&d)).is_empty());
        assert_eq!(
            idx.calculate_range(&RangeOp::Gte(&json!(0)), &key(&d)).len(),
            d.len()
        );
    }

    #[test]
    fn reposition_adaptive_moves_without_shifting_others() {
        let mut d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));

        let old_value = d[0].clone();
        d[0] = json!(5);
        idx.reposition_adaptive(0, &old_value, &key(&d));

        assert_eq!(idx.len(), d.len());
        let ordered: Vec<Value> = idx.values().iter().map(|&p| d[p].clone()).collect();
        let mut sorted_expected = ordered.clone();
        sorted_expected.sort_by(Comparator::compare);
        assert_eq!(ordered, sorted_expected);
        assert!(idx.values().contains(&0));
    }

    #[test]
    fn adaptive_insert_keeps_index_sorted() {
        let mut d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));

        d.push(json!(27));
        let new_pos = d.len() - 1;
        idx.insert_adaptive(new_pos, &key(&d));

        let ordered: Vec<Value> = idx.values().iter().map(|&p| d[p].clone()).collect();
        let mut sorted_expected = ordered.clone();
        sorted_expected.sort_by(Comparator::compare);
        assert_eq!(ordered, sorted_expected);
        assert_eq!(idx.len(), d.len());
    }

    #[test]
    fn adaptive_remove_compensates_positions() {
        let mut d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));

        // Remove position 1 (value 25).
        let removed_value = d[1].clone();
        d.remove(1);
        idx.remove_adaptive(1, &removed_value, &key(&d));

        assert_eq!(idx.len(), d.len());
        let ordered: Vec<Value> = idx.values().iter().map(|&p| d[p].clone()).collect();
        let mut sorted_expected = ordered.clone();
        sorted_expected.sort_by(Comparator::compare);
        assert_eq!(ordered, sorted_expected);
    }

    #[test]
    fn batch_remove_matches_sequential_adaptive_remove() {
        let d = data();

        let mut sequential = BinaryIndex::new("age");
        sequential.rebuild(d.len(), key(&d));
        let mut seq_data = d.clone();
        // Remove positions 4 then 1 (descending, so earlier indices stay valid).
        let v4 = seq_data[4].clone();
        seq_data.remove(4);
        sequential.remove_adaptive(4, &v4, &key(&seq_data));
        let v1 = seq_data[1].clone();
        seq_data.remove(1);
        sequential.remove_adaptive(1, &v1, &key(&seq_data));

        let mut batch = BinaryIndex::new("age");
        batch.rebuild(d.len(), key(&d));
        batch.remove_batch(&[1, 4]);

        let mut seq_values = sequential.values().to_vec();
        let mut batch_values = batch.values().to_vec();
        seq_values.sort_unstable();
        batch_values.sort_unstable();
        assert_eq!(seq_values, batch_values);
    }

    #[test]
    fn check_detects_out_of_order_index() {
        let d = data();
        let mut idx = BinaryIndex::new("age");
        idx.rebuild(d.len(), key(&d));
        assert!(idx.check(key(&d), false, 1.0));

        // Corrupt the index manually.
        let values = idx.values().to_vec();
        let mut reversed = values;
        reversed.reverse();
        let mut corrupt = BinaryIndex::new("age");
        corrupt.rebuild(d.len(), key(&d));
        // Force-set corrupt ordering by rebuilding then swapping two entries.
        let mut corrupt_values = corrupt.values().to_vec();
        corrupt_values.swap(0, corrupt_values.len() - 1);
        let corrupt2 = BinaryIndex {
            property: "age".to_string(),
            values: corrupt_values,
            dirty: false,
        };
        assert!(!corrupt2.check(key(&d), false, 1.0));
    }
}
