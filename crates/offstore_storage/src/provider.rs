//! Connection providers: where databases live and how they are opened.

use crate::connection::{Connection, UpgradeFn};
use crate::error::{StorageError, StorageResult};
use crate::file::FileBackend;
use crate::memory::InMemoryBackend;
use fs2::FileExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::info;

/// File extension of journal files created by [`DirectoryProvider`].
pub const JOURNAL_EXTENSION: &str = "journal";

/// Opens and deletes named databases.
///
/// The provider owns where the bytes live; the returned connection is shared
/// by its users and closed by whoever opened it.
pub trait ConnectionProvider: Send + Sync {
    /// Opens (or creates) the database `name` at schema `version`.
    ///
    /// `upgrade` runs once if the stored version is lower than `version`
    /// (a new database has version 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, is locked, is
    /// newer than `version`, or `upgrade` fails.
    fn open(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut UpgradeFn<'_>,
    ) -> StorageResult<Arc<Connection>>;

    /// Deletes the database `name` and all of its stores.
    ///
    /// Deleting a database that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is in use or cannot be removed.
    fn delete(&self, name: &str) -> StorageResult<()>;
}

/// Keeps named databases in memory for the lifetime of the provider.
///
/// Reopening a name sees everything committed by earlier connections. Like
/// [`DirectoryProvider`], a database has at most one open connection: opening
/// or deleting it fails with [`StorageError::DatabaseLocked`] until that
/// connection is closed or dropped.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    databases: Mutex<HashMap<String, MemoryDatabase>>,
    sync_on_commit: bool,
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    backend: InMemoryBackend,
    live: Weak<Connection>,
}

impl MemoryDatabase {
    fn is_open(&self) -> bool {
        self.live
            .upgrade()
            .is_some_and(|connection| !connection.is_closed())
    }
}

impl MemoryProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the journal backend of a database, if it exists.
    #[must_use]
    pub fn backend(&self, name: &str) -> Option<InMemoryBackend> {
        self.databases
            .lock()
            .get(name)
            .map(|database| database.backend.clone())
    }
}

impl ConnectionProvider for MemoryProvider {
    fn open(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut UpgradeFn<'_>,
    ) -> StorageResult<Arc<Connection>> {
        // Held across the open so two callers cannot both pass the check.
        let mut databases = self.databases.lock();
        let database = databases.entry(name.to_string()).or_default();
        if database.is_open() {
            return Err(StorageError::DatabaseLocked);
        }
        let backend = Box::new(database.backend.clone());
        let connection = Arc::new(Connection::open_with_backend(
            name,
            version,
            backend,
            self.sync_on_commit,
            upgrade,
        )?);
        database.live = Arc::downgrade(&connection);
        Ok(connection)
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let mut databases = self.databases.lock();
        if databases.get(name).is_some_and(MemoryDatabase::is_open) {
            return Err(StorageError::DatabaseLocked);
        }
        if databases.remove(name).is_some() {
            info!(database = name, "deleted in-memory database");
        }
        Ok(())
    }
}

/// Stores each database as one journal file inside a directory.
///
/// ```text
/// <root>/
/// ├─ offstore.journal
/// └─ other.journal
/// ```
#[derive(Debug, Clone)]
pub struct DirectoryProvider {
    root: PathBuf,
    sync_on_commit: bool,
}

impl DirectoryProvider {
    /// Creates a provider rooted at `root`. The directory is created on the
    /// first open.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sync_on_commit: true,
        }
    }

    /// Sets whether every commit is synced to disk (default `true`).
    #[must_use]
    pub fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the journal path for a database name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the name is empty or would
    /// escape the root directory.
    pub fn journal_path(&self, name: &str) -> StorageResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\'])
            && !name.contains('\0');
        if !valid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(format!("{name}.{JOURNAL_EXTENSION}")))
    }

    /// Lists the names of databases present in the root directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory exists but cannot be read.
    pub fn database_names(&self) -> StorageResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(JOURNAL_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl ConnectionProvider for DirectoryProvider {
    fn open(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut UpgradeFn<'_>,
    ) -> StorageResult<Arc<Connection>> {
        let path = self.journal_path(name)?;
        let backend = FileBackend::open_with_create_dirs(&path)?;
        let connection =
            Connection::open_with_backend(name, version, Box::new(backend), self.sync_on_commit, upgrade)?;
        Ok(Arc::new(connection))
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.journal_path(name)?;
        if !path.exists() {
            return Ok(());
        }

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::DatabaseLocked);
        }
        std::fs::remove_file(&path)?;
        drop(file);
        info!(database = name, path = %path.display(), "deleted database");
        Ok(())
    }
}
