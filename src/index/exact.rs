//! `ExactIndex`: a value-to-positions multimap for exact-match lookups
//!
//! Unlike [`UniqueIndex`](super::unique::UniqueIndex), many documents may
//! share a key - `get` returns the bag of positions currently holding
//! that value.

use std::collections::HashMap;

use serde_json::Value;

fn key_of(value: &Value) -> String {
    value.to_string()
}

/// A value -> Vec<position> bag index for exact-match queries.
#[derive(Debug, Clone, Default)]
pub struct ExactIndex {
    property: String,
    table: HashMap<String, Vec<usize>>,
}

impl ExactIndex {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            table: HashMap::new(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    /// All positions currently holding `value`.
    pub fn get(&self, value: &Value) -> &[usize] {
        self.table.get(&key_of(value)).map_or(&[], Vec::as_slice)
    }

    pub fn insert(&mut self, value: &Value, position: usize) {
        self.table.entry(key_of(value)).or_default().push(position);
    }

    pub fn remove(&mut self, value: &Value, position: usize) {
        let key = key_of(value);
        if let Some(positions) = self.table.get_mut(&key) {
            positions.retain(|&p| p != position);
            if positions.is_empty() {
                self.table.remove(&key);
            }
        }
    }

    pub fn update(&mut self, old_value: &Value, new_value: &Value, position: usize) {
        self.remove(old_value, position);
        self.insert(new_value, position);
    }

    pub fn rebuild<F>(&mut self, len: usize, key: F)
    where
        F: Fn(usize) -> Value,
    {
        self.table.clear();
        for position in 0..len {
            self.insert(&key(position), position);
        }
    }

    /// Shifts every stored position greater than `removed` down by one,
    /// after a compacting removal from the owning collection's `data`.
    pub fn shift_after_removal(&mut self, removed: usize) {
        for positions in self.table.values_mut() {
            for p in positions.iter_mut() {
                if *p > removed {
                    *p -= 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tracks_multiple_positions_per_value() {
        let mut idx = ExactIndex::new("country");
        idx.insert(&json!("fr"), 0);
        idx.insert(&json!("fr"), 2);
        idx.insert(&json!("us"), 1);
        assert_eq!(idx.get(&json!("fr")), &[0, 2]);
        assert_eq!(idx.get(&json!("us")), &[1]);
        assert!(idx.get(&json!("de")).is_empty());
    }

    #[test]
    fn remove_drops_empty_buckets() {
        let mut idx = ExactIndex::new("country");
        idx.insert(&json!("fr"), 0);
        idx.remove(&json!("fr"), 0);
        assert!(idx.get(&json!("fr")).is_empty());
    }

    #[test]
    fn update_moves_position_between_buckets() {
        let mut idx = ExactIndex::new("country");
        idx.insert(&json!("fr"), 0);
        idx.update(&json!("fr"), &json!("us"), 0);
        assert!(idx.get(&json!("fr")).is_empty());
        assert_eq!(idx.get(&json!("us")), &[0]);
    }

    #[test]
    fn shift_after_removal_adjusts_all_buckets() {
        let mut idx = ExactIndex::new("country");
        idx.insert(&json!("fr"), 0);
        idx.insert(&json!("fr"), 3);
        idx.shift_after_removal(1);
        assert_eq!(idx.get(&json!("fr")), &[0, 2]);
    }
}
