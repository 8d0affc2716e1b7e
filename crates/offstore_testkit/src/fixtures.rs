//! Test fixtures: sample records and ready-to-use databases.

use offstore_core::{
    open_database, ByteRange, CellConfig, Connection, ConnectionProvider, ContentType,
    DatabaseConfig, DirectoryProvider, Expiration, Key, ManifestRecord, MemoryProvider,
    SegmentRecord, SegmentReference, StorageCell, StreamRecord,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Creates a segment holding `bytes`, with a byte range covering them.
pub fn create_segment_data(bytes: &[u8]) -> SegmentRecord {
    let range = match bytes.len() {
        0 => ByteRange::new(0, None),
        len => ByteRange::new(0, Some(len as u64 - 1)),
    };
    SegmentRecord::new(bytes.to_vec()).with_byte_range(range)
}

/// Creates a manifest for `original_uri` with one video and one audio
/// stream, session ids and app metadata.
///
/// Segment keys are placeholders; they do not need to exist in the
/// segment store.
pub fn create_manifest(original_uri: &str) -> ManifestRecord {
    let mut manifest = ManifestRecord::new(original_uri);
    manifest.duration_ms = 90_000;
    manifest.size = 1024;
    manifest.expiration = Expiration::NEVER;
    manifest.streams = vec![
        create_stream(1, ContentType::Video, "video/mp4", "avc1.42c01e", 10),
        create_stream(2, ContentType::Audio, "audio/mp4", "mp4a.40.2", 20),
    ];
    manifest.session_ids = vec!["session-1".to_string()];
    manifest
        .app_metadata
        .insert("title".to_string(), original_uri.to_string());
    manifest
}

fn create_stream(
    id: u32,
    content_type: ContentType,
    mime_type: &str,
    codecs: &str,
    first_key: u64,
) -> StreamRecord {
    StreamRecord {
        id,
        content_type,
        mime_type: mime_type.to_string(),
        codecs: codecs.to_string(),
        language: Some("en".to_string()),
        init_segment_key: Some(Key::from_raw(first_key)),
        segments: (1..=3)
            .map(|i| SegmentReference {
                start_ms: (i - 1) * 30_000,
                end_ms: i * 30_000,
                data_key: Key::from_raw(first_key + i),
            })
            .collect(),
    }
}

/// An offline database for tests, removed when dropped.
pub struct TestStorage {
    config: DatabaseConfig,
    connection: Arc<Connection>,
    _temp_dir: Option<TempDir>,
}

impl TestStorage {
    /// Opens a fresh in-memory database with both stores.
    pub fn memory() -> Self {
        let config = DatabaseConfig::default();
        let connection = open_database(&MemoryProvider::new(), &config)
            .expect("Failed to open in-memory database");
        Self {
            config,
            connection,
            _temp_dir: None,
        }
    }

    /// Opens a fresh database in a temporary directory.
    pub fn directory() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = DatabaseConfig::default();
        let connection = open_database(&DirectoryProvider::new(temp_dir.path()), &config)
            .expect("Failed to open directory database");
        Self {
            config,
            connection,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Opens the database through `provider`.
    pub fn with_provider(provider: &dyn ConnectionProvider) -> Self {
        let config = DatabaseConfig::default();
        let connection = open_database(provider, &config).expect("Failed to open database");
        Self {
            config,
            connection,
            _temp_dir: None,
        }
    }

    /// Returns the shared connection.
    pub fn connection(&self) -> Arc<Connection> {
        Arc::clone(&self.connection)
    }

    /// Returns the database configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Returns the temporary directory for directory databases.
    pub fn path(&self) -> Option<&Path> {
        self._temp_dir.as_ref().map(TempDir::path)
    }

    /// Creates a writable cell over the database's stores.
    pub fn cell(&self) -> StorageCell {
        StorageCell::new(self.connection(), self.config.cell_config())
    }

    /// Creates a read-only cell over the database's stores.
    pub fn read_only_cell(&self) -> StorageCell {
        StorageCell::new(self.connection(), self.config.cell_config().read_only(true))
    }

    /// Creates a cell with an explicit configuration.
    pub fn cell_with(&self, config: CellConfig) -> StorageCell {
        StorageCell::new(self.connection(), config)
    }
}

impl Drop for TestStorage {
    fn drop(&mut self) {
        self.connection.close();
    }
}
