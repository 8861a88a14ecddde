//! Per-collection configuration (§9.3 of the ambient stack)

/// Time-to-live expiration settings for a collection.
#[derive(Debug, Clone)]
pub struct TtlOptions {
    /// Documents older than this (by `meta.updated`) are swept. Disabled
    /// when `None`.
    pub age: Option<chrono::Duration>,
    /// How often the daemon sweeps, if driven by [`Collection::ttl_sweep`](crate::collection::Collection::ttl_sweep).
    pub interval: chrono::Duration,
}

impl Default for TtlOptions {
    fn default() -> Self {
        Self {
            age: None,
            interval: chrono::Duration::seconds(60),
        }
    }
}

/// Construction-time configuration for a [`Collection`](crate::collection::Collection).
#[derive(Debug, Clone, Default)]
pub struct CollectionOptions {
    /// Fields that get a `UniqueIndex`.
    pub unique: Vec<String>,
    /// Fields that get an `ExactIndex`.
    pub exact: Vec<String>,
    /// Properties that get a `BinaryIndex`.
    pub indices: Vec<String>,
    /// Binary indices are kept incrementally up to date rather than
    /// lazily rebuilt on first use after a mutation.
    pub adaptive_binary_indices: bool,
    pub ttl: TtlOptions,
    /// Suppresses the reserved `meta` block (created/updated/revision).
    pub disable_meta: bool,
}
