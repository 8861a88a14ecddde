//! Storage adapter boundary (spec.md §6)
//!
//! The source models this as a three-method callback contract
//! (`loadDatabase`/`saveDatabase`/`deleteDatabase`, each taking a
//! continuation). Per SPEC_FULL.md §9 this is re-modeled as a synchronous
//! `Result`-returning trait: the call returns only once the underlying
//! I/O has completed, matching this crate's single-threaded cooperative
//! execution model (§5) rather than carrying callback machinery that has
//! no async runtime to run on here.
//!
//! Only the *default* mode (string payload) is implemented as a concrete
//! adapter ([`FileStorageAdapter`]); *reference* and *incremental* modes
//! are collaborator-described only, per spec.md's explicit scoping of the
//! adapter to "described only at its boundary".

use std::fs;
use std::path::PathBuf;

use super::error::{DbError, DbResult};

/// A storage backend for whole-database payloads, keyed by name.
pub trait StorageAdapter {
    /// Loads the named database's payload, or `None` if it doesn't exist.
    fn load_database(&self, name: &str) -> DbResult<Option<String>>;
    /// Persists `payload` under `name`, replacing any existing content.
    fn save_database(&self, name: &str, payload: &str) -> DbResult<()>;
    /// Removes the named database's payload, if present.
    fn delete_database(&self, name: &str) -> DbResult<()>;
}

/// A [`StorageAdapter`] backed by one file per database name under a
/// base directory.
pub struct FileStorageAdapter {
    base_dir: PathBuf,
}

impl FileStorageAdapter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }
}

impl StorageAdapter for FileStorageAdapter {
    fn load_database(&self, name: &str) -> DbResult<Option<String>> {
        match fs::read_to_string(self.path_for(name)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DbError::adapter_error(e.to_string())),
        }
    }

    fn save_database(&self, name: &str, payload: &str) -> DbResult<()> {
        if let Some(parent) = self.path_for(name).parent() {
            fs::create_dir_all(parent).map_err(|e| DbError::adapter_error(e.to_string()))?;
        }
        fs::write(self.path_for(name), payload).map_err(|e| DbError::adapter_error(e.to_string()))
    }

    fn delete_database(&self, name: &str) -> DbResult<()> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DbError::adapter_error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileStorageAdapter::new(dir.path());
        assert!(adapter.load_database("nope").unwrap().is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileStorageAdapter::new(dir.path());
        adapter.save_database("mydb", "{}").unwrap();
        assert_eq!(adapter.load_database("mydb").unwrap(), Some("{}".to_string()));
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileStorageAdapter::new(dir.path());
        adapter.save_database("mydb", "{}").unwrap();
        adapter.delete_database("mydb").unwrap();
        adapter.delete_database("mydb").unwrap();
        assert!(adapter.load_database("mydb").unwrap().is_none());
    }
}
