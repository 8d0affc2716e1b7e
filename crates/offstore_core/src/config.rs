//! Database and cell configuration.

/// Default database name.
pub const DEFAULT_DATABASE_NAME: &str = "offstore";

/// Default name of the segment store.
pub const DEFAULT_SEGMENT_STORE: &str = "segment-store";

/// Default name of the manifest store.
pub const DEFAULT_MANIFEST_STORE: &str = "manifest-store";

/// Schema version written by this release.
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

/// Configuration for opening an offline database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database name passed to the connection provider.
    pub name: String,

    /// Schema version to open at.
    pub version: u64,

    /// Name of the segment store.
    pub segment_store: String,

    /// Name of the manifest store.
    pub manifest_store: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_DATABASE_NAME.to_string(),
            version: CURRENT_SCHEMA_VERSION,
            segment_store: DEFAULT_SEGMENT_STORE.to_string(),
            manifest_store: DEFAULT_MANIFEST_STORE.to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the schema version.
    #[must_use]
    pub const fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Sets both store names.
    #[must_use]
    pub fn stores(mut self, segment_store: impl Into<String>, manifest_store: impl Into<String>) -> Self {
        self.segment_store = segment_store.into();
        self.manifest_store = manifest_store.into();
        self
    }

    /// Returns a writable cell configuration over this database's stores.
    #[must_use]
    pub fn cell_config(&self) -> CellConfig {
        CellConfig {
            segment_store: self.segment_store.clone(),
            manifest_store: self.manifest_store.clone(),
            read_only: false,
        }
    }
}

/// Configuration for a storage cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellConfig {
    /// Name of the segment store.
    pub segment_store: String,

    /// Name of the manifest store.
    pub manifest_store: String,

    /// Whether add, remove and update operations are rejected.
    pub read_only: bool,
}

impl Default for CellConfig {
    fn default() -> Self {
        DatabaseConfig::default().cell_config()
    }
}

impl CellConfig {
    /// Creates a writable configuration for the given stores.
    #[must_use]
    pub fn new(segment_store: impl Into<String>, manifest_store: impl Into<String>) -> Self {
        Self {
            segment_store: segment_store.into(),
            manifest_store: manifest_store.into(),
            read_only: false,
        }
    }

    /// Sets whether the cell is read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }
}
