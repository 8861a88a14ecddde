//! Serializable database/collection shells (spec.md §6)
//!
//! These mirror the fields the source persists, minus the fields spec.md
//! §6 says a `Normal`/`Pretty` dump nulls out or omits entirely
//! (`autosaveHandle`, `persistenceAdapter`, `constraints`, `ttl`,
//! `throttledSavePending`, `throttledCallbacks`, `lokiConsoleWrapper`) -
//! there is nothing here to null because this crate never materializes
//! those fields in the first place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The current persisted schema version. Loading an older payload
/// triggers the version-gated upgrade in [`super::Database::load_json`].
pub const CURRENT_DATABASE_VERSION: f64 = 1.5;
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbShell {
    pub filename: String,
    pub database_version: f64,
    pub engine_version: String,
    pub collections: Vec<CollectionShell>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionShell {
    pub name: String,
    pub data: Vec<Value>,
    pub id_index: Vec<u64>,
    pub max_id: u64,
    pub unique: Vec<String>,
    pub exact: Vec<String>,
    pub indices: Vec<String>,
    pub adaptive_binary_indices: bool,
    pub disable_meta: bool,
}
