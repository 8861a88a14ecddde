//! `UniqueIndex`: a field-value-to-position map enforcing one document per
//! key
//!
//! Keys are the JSON-string rendering of the indexed value (so `1` and
//! `"1"` are distinct keys, matching [`Comparator`](crate::comparator::Comparator)'s
//! refusal to coerce across the string/number boundary). `null`/missing
//! values are never tracked - spec.md exempts them from the uniqueness
//! constraint.

use std::collections::HashMap;

use serde_json::Value;

use super::error::{IndexError, IndexResult};

fn key_of(value: &Value) -> Option<String> {
    if value.is_null() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Enforces at most one data position per non-null key value.
#[derive(Debug, Clone, Default)]
pub struct UniqueIndex {
    property: String,
    key_to_position: HashMap<String, usize>,
}

impl UniqueIndex {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            key_to_position: HashMap::new(),
        }
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn len(&self) -> usize {
        self.key_to_position.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_position.is_empty()
    }

    /// Looks up the data position holding `value`, if any.
    pub fn get(&self, value: &Value) -> Option<usize> {
        key_of(value).and_then(|k| self.key_to_position.get(&k).copied())
    }

    /// Registers a fresh `(value, position)` pair. Rejects a duplicate of
    /// an already-tracked non-null value.
    pub fn set(&mut self, value: &Value, position: usize) -> IndexResult<()> {
        let Some(key) = key_of(value) else {
            return Ok(());
        };
        if self.key_to_position.contains_key(&key) {
            return Err(IndexError::duplicate_key(self.property.clone(), key));
        }
        self.key_to_position.insert(key, position);
        Ok(())
    }

    /// Replaces the mapping for an update: removes `old_value`'s entry
    /// (if any) and inserts `new_value`, rejecting a collision with a
    /// different document's key.
    pub fn update(&mut self, old_value: &Value, new_value: &Value, position: usize) -> IndexResult<()> {
        if let Some(old_key) = key_of(old_value) {
            if self.key_to_position.get(&old_key) == Some(&position) {
                self.key_to_position.remove(&old_key);
            }
        }
        self.set(new_value, position)
    }

    /// Drops the entry for `value`, if it still points at `position`.
    pub fn remove(&mut self, value: &Value, position: usize) {
        if let Some(key) = key_of(value) {
            if self.key_to_position.get(&key) == Some(&position) {
                self.key_to_position.remove(&key);
            }
        }
    }

    /// Rebuilds from scratch given a position -> value resolver.
    /// Returns an error on the first duplicate found while scanning.
    pub fn rebuild<F>(&mut self, len: usize, key: F) -> IndexResult<()>
    where
        F: Fn(usize) -> Value,
    {
        self.key_to_position.clear();
        for position in 0..len {
            self.set(&key(position), position)?;
        }
        Ok(())
    }

    /// Shifts every stored position greater than `removed` down by one,
    /// after a compacting removal from the owning collection's `data`.
    pub fn shift_after_removal(&mut self, removed: usize) {
        for position in self.key_to_position.values_mut() {
            if *position > removed {
                *position -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_and_get_roundtrip() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!("a@example.com"), 0).unwrap();
        assert_eq!(idx.get(&json!("a@example.com")), Some(0));
        assert_eq!(idx.get(&json!("missing@example.com")), None);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!("a@example.com"), 0).unwrap();
        let err = idx.set(&json!("a@example.com"), 1).unwrap_err();
        assert_eq!(err.code(), "LOKI_DUPLICATE_KEY");
    }

    #[test]
    fn null_values_are_exempt_from_uniqueness() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!(null), 0).unwrap();
        idx.set(&json!(null), 1).unwrap();
        assert!(idx.is_empty());
    }

    #[test]
    fn update_moves_the_key() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!("old@example.com"), 0).unwrap();
        idx.update(&json!("old@example.com"), &json!("new@example.com"), 0)
            .unwrap();
        assert_eq!(idx.get(&json!("old@example.com")), None);
        assert_eq!(idx.get(&json!("new@example.com")), Some(0));
    }

    #[test]
    fn remove_drops_only_matching_position() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!("a@example.com"), 0).unwrap();
        idx.remove(&json!("a@example.com"), 1); // wrong position, no-op
        assert_eq!(idx.get(&json!("a@example.com")), Some(0));
        idx.remove(&json!("a@example.com"), 0);
        assert_eq!(idx.get(&json!("a@example.com")), None);
    }

    #[test]
    fn number_and_string_keys_do_not_collide() {
        let mut idx = UniqueIndex::new("code");
        idx.set(&json!(1), 0).unwrap();
        idx.set(&json!("1"), 1).unwrap();
        assert_eq!(idx.get(&json!(1)), Some(0));
        assert_eq!(idx.get(&json!("1")), Some(1));
    }

    #[test]
    fn shift_after_removal_adjusts_positions() {
        let mut idx = UniqueIndex::new("email");
        idx.set(&json!("a@example.com"), 0).unwrap();
        idx.set(&json!("b@example.com"), 2).unwrap();
        idx.shift_after_removal(1);
        assert_eq!(idx.get(&json!("a@example.com")), Some(0));
        assert_eq!(idx.get(&json!("b@example.com")), Some(1));
    }
}
