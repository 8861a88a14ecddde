//! Documents: schemaless JSON objects plus two reserved fields
//!
//! A document is any JSON object. [`Collection`](crate::collection::Collection)
//! stamps two reserved fields onto every document it owns: `$id` (a
//! per-collection monotonic integer) and `meta` (created/updated
//! timestamps plus a revision counter). Everything else is opaque to the
//! engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The reserved `meta` object stamped onto every stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub revision: u64,
    /// Bumped only by explicit schema-evolution callers; the engine
    /// itself never changes it after insert.
    pub version: u64,
}

impl Meta {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            created: now,
            updated: now,
            revision: 0,
            version: 0,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated = now;
        self.revision += 1;
    }
}

/// The reserved primary key field name.
pub const ID_FIELD: &str = "$id";
/// The reserved metadata field name.
pub const META_FIELD: &str = "meta";

/// Returns the document's `$id`, if present and numeric.
pub fn get_id(doc: &Value) -> Option<u64> {
    doc.get(ID_FIELD).and_then(Value::as_u64)
}

/// Sets `$id` on a document, which must be a JSON object.
pub fn set_id(doc: &mut Value, id: u64) {
    if let Value::Object(map) = doc {
        map.insert(ID_FIELD.to_string(), Value::from(id));
    }
}

/// Returns the document's `meta` block, if present and well-formed.
pub fn get_meta(doc: &Value) -> Option<Meta> {
    doc.get(META_FIELD)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Sets `meta` on a document, which must be a JSON object.
pub fn set_meta(doc: &mut Value, meta: &Meta) {
    if let Value::Object(map) = doc {
        map.insert(
            META_FIELD.to_string(),
            serde_json::to_value(meta).expect("Meta always serializes"),
        );
    }
}

/// Returns the effective timestamp the TTL daemon compares against:
/// `meta.updated` if present, otherwise `meta.created`.
pub fn ttl_reference(doc: &Value) -> Option<DateTime<Utc>> {
    get_meta(doc).map(|m| m.updated)
}
