//! Database: a container of named collections and the persistence
//! boundary (spec.md §4.7, §6)
//!
//! Owns the `$id` monotonic space per collection (never across
//! collections), and knows how to turn itself into a string payload
//! (`serialize`) or rebuild itself from one (`load_json`) through a
//! pluggable [`StorageAdapter`].

pub mod adapter;
pub mod error;
pub mod options;
pub mod shell;

pub use adapter::{FileStorageAdapter, StorageAdapter};
pub use error::{DbError, DbResult};
pub use options::{DatabaseOptions, SerializationFormat};
pub use shell::{CollectionShell, DbShell, CURRENT_DATABASE_VERSION, ENGINE_VERSION};

use std::collections::HashMap;

use crate::collection::{Collection, CollectionOptions};
use crate::diagnostics::{Logger, Severity};

/// Destructured format's segment delimiter (spec.md §6).
const DESTRUCTURED_DELIMITER: &str = "$<\n";

/// A named collection of collections, serializable as a whole.
pub struct Database {
    filename: String,
    options: DatabaseOptions,
    database_version: f64,
    collections: HashMap<String, Collection>,
    /// Preserves `addCollection` order for deterministic serialization.
    collection_order: Vec<String>,
}

impl Database {
    pub fn new(filename: impl Into<String>, options: DatabaseOptions) -> Self {
        Self {
            filename: filename.into(),
            options,
            database_version: CURRENT_DATABASE_VERSION,
            collections: HashMap::new(),
            collection_order: Vec::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn database_version(&self) -> f64 {
        self.database_version
    }

    /// Creates a new, empty collection, replacing any existing one of the
    /// same name.
    pub fn add_collection(&mut self, name: impl Into<String>, options: CollectionOptions) -> &mut Collection {
        let name = name.into();
        if !self.collections.contains_key(&name) {
            self.collection_order.push(name.clone());
        }
        self.collections.insert(name.clone(), Collection::new(name.clone(), options));
        self.collections.get_mut(&name).expect("just inserted")
    }

    /// Looks up a collection by name. A miss is a warning, not an error,
    /// per spec.md §7's `getCollection` contract.
    pub fn get_collection(&self, name: &str) -> Option<&Collection> {
        let found = self.collections.get(name);
        if found.is_none() {
            Logger::log_stderr(Severity::Warn, "collection.miss", &[("name", name)]);
        }
        found
    }

    pub fn get_collection_mut(&mut self, name: &str) -> Option<&mut Collection> {
        self.collections.get_mut(name)
    }

    pub fn remove_collection(&mut self, name: &str) {
        self.collections.remove(name);
        self.collection_order.retain(|n| n != name);
    }

    pub fn collection_names(&self) -> &[String] {
        &self.collection_order
    }

    fn to_shell(&self) -> DbShell {
        let collections = self
            .collection_order
            .iter()
            .filter_map(|name| self.collections.get(name))
            .map(|coll| CollectionShell {
                name: coll.name().to_string(),
                data: coll.data().to_vec(),
                id_index: coll.data().iter().filter_map(crate::document::get_id).collect(),
                max_id: coll.max_id(),
                unique: coll.options().unique.clone(),
                exact: coll.options().exact.clone(),
                indices: coll.options().indices.clone(),
                adaptive_binary_indices: coll.options().adaptive_binary_indices,
                disable_meta: coll.options().disable_meta,
            })
            .collect();
        DbShell {
            filename: self.filename.clone(),
            database_version: self.database_version,
            engine_version: ENGINE_VERSION.to_string(),
            collections,
        }
    }

    /// Renders the database as a string payload in the configured
    /// [`SerializationFormat`].
    pub fn serialize(&self) -> DbResult<String> {
        match self.options.format {
            SerializationFormat::Normal => Ok(serde_json::to_string(&self.to_shell())?),
            SerializationFormat::Pretty => Ok(serde_json::to_string_pretty(&self.to_shell())?),
            SerializationFormat::Destructured => self.serialize_destructured(),
        }
    }

    fn serialize_destructured(&self) -> DbResult<String> {
        let mut shell = self.to_shell();
        for coll in &mut shell.collections {
            coll.data.clear();
        }
        let mut out = serde_json::to_string(&shell)?;
        out.push('\n');
        for name in &self.collection_order {
            let Some(coll) = self.collections.get(name) else { continue };
            for doc in coll.data() {
                out.push_str(&serde_json::to_string(doc)?);
                out.push('\n');
            }
            out.push_str(DESTRUCTURED_DELIMITER);
        }
        out.push_str(DESTRUCTURED_DELIMITER);
        Ok(out)
    }

    /// Rebuilds this database's collections from a serialized payload,
    /// replacing current contents. Applies the version-gated upgrade from
    /// spec.md §6 when the payload predates 1.5.
    pub fn load_json(&mut self, payload: &str) -> DbResult<()> {
        let shell = if payload.contains(DESTRUCTURED_DELIMITER) {
            self.parse_destructured(payload)?
        } else {
            serde_json::from_str(payload)?
        };
        self.load_shell(shell)
    }

    fn parse_destructured(&self, payload: &str) -> DbResult<DbShell> {
        let mut segments = payload.splitn(2, '\n');
        let header = segments
            .next()
            .ok_or_else(|| DbError::serialization_error("empty destructured payload"))?;
        let mut shell: DbShell = serde_json::from_str(header)?;
        let rest = segments.next().unwrap_or("");

        let mut collection_chunks = rest.split(DESTRUCTURED_DELIMITER);
        for coll in &mut shell.collections {
            let chunk = collection_chunks.next().unwrap_or("");
            for line in chunk.lines().filter(|l| !l.is_empty()) {
                coll.data.push(serde_json::from_str(line)?);
            }
        }
        Ok(shell)
    }

    fn load_shell(&mut self, shell: DbShell) -> DbResult<()> {
        let force_rebuild = shell.database_version < 1.5;
        if force_rebuild {
            Logger::log(
                Severity::Info,
                "db.upgrade",
                &[("from_version", &shell.database_version.to_string())],
            );
        }

        self.filename = shell.filename;
        self.database_version = CURRENT_DATABASE_VERSION;
        self.collections.clear();
        self.collection_order.clear();

        for coll in shell.collections {
            let options = CollectionOptions {
                unique: coll.unique,
                exact: coll.exact,
                indices: coll.indices,
                adaptive_binary_indices: coll.adaptive_binary_indices,
                disable_meta: coll.disable_meta,
                ..Default::default()
            };
            let restored = Collection::restore(
                coll.name.clone(),
                options,
                coll.data,
                coll.id_index,
                coll.max_id,
                force_rebuild,
            )?;
            self.collection_order.push(coll.name.clone());
            self.collections.insert(coll.name, restored);
        }
        Ok(())
    }

    /// Loads from `adapter`, replacing current contents. A missing
    /// database (adapter returns `None`) leaves an empty database in
    /// place without error.
    pub fn load_from(&mut self, adapter: &dyn StorageAdapter) -> DbResult<()> {
        if let Some(payload) = adapter.load_database(&self.filename)? {
            self.load_json(&payload)?;
        }
        Ok(())
    }

    /// Serializes and persists the database through `adapter`.
    pub fn save_to(&self, adapter: &dyn StorageAdapter) -> DbResult<()> {
        let payload = self.serialize()?;
        adapter.save_database(&self.filename, &payload)
    }
}
