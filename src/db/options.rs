//! Database-level configuration (spec.md §6, §9.3)

/// How [`super::Database::serialize`] renders the database to a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializationFormat {
    /// Canonical single-line JSON of the database shell.
    #[default]
    Normal,
    /// As `Normal`, indented for human inspection.
    Pretty,
    /// The database shell (collections with their `data` emptied out) as
    /// one JSON line, followed by each collection's documents written one
    /// per line and terminated by an empty delimiter line.
    Destructured,
}

/// Database-wide configuration. Analogous to [`crate::collection::CollectionOptions`]
/// at the container level: plain data plus `Default`, no CLI parsing.
#[derive(Debug, Clone)]
pub struct DatabaseOptions {
    pub format: SerializationFormat,
    /// Free-form hint describing the host environment (mirrors the
    /// teacher's environment-detection glue; this crate does not act on
    /// it beyond carrying it through persisted shells).
    pub env_hint: String,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            format: SerializationFormat::default(),
            env_hint: "generic".to_string(),
        }
    }
}
