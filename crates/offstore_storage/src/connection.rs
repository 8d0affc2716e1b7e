//! Transactional connection over a journaled set of object stores.

use crate::backend::JournalBackend;
use crate::error::{StorageError, StorageResult};
use crate::journal::{encode_frame, replay, JournalEntry, JournalOp};
use crate::schema::{DatabaseState, SchemaUpgrade};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Callback that creates or changes stores when a database is upgraded.
pub type UpgradeFn<'u> = dyn FnMut(&mut SchemaUpgrade<'_>) -> StorageResult<()> + 'u;

/// An open database: a set of named object stores with transactions.
///
/// A `Connection` is normally shared behind an `Arc` by every component that
/// reads or writes the database. Whoever opened it decides when to
/// [`close`](Self::close) it.
///
/// ## Concurrency
///
/// - Read-write transactions are serialized: [`begin_write`](Self::begin_write)
///   waits asynchronously until the previous writer commits, aborts or drops.
/// - Reads observe the latest committed state and never see staged writes of
///   another transaction.
/// - A commit is journaled (and synced when `sync_on_commit` is set) before it
///   becomes visible. If journaling fails, nothing becomes visible.
pub struct Connection {
    id: Uuid,
    name: String,
    state: RwLock<DatabaseState>,
    journal: Mutex<Box<dyn JournalBackend>>,
    writer: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    sync_on_commit: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Opens a database on an existing journal backend.
    ///
    /// The journal is replayed first; a torn tail frame is truncated away.
    /// If `version` is newer than the stored version, `upgrade` runs exactly
    /// once and its schema changes are journaled atomically with the new
    /// version.
    ///
    /// # Errors
    ///
    /// - [`StorageError::VersionMismatch`] if `version` is 0 or older than
    ///   the stored version
    /// - [`StorageError::Corrupted`] if the journal is damaged before its tail
    /// - any error returned by `upgrade`, in which case nothing is written
    pub fn open_with_backend(
        name: &str,
        version: u64,
        mut backend: Box<dyn JournalBackend>,
        sync_on_commit: bool,
        upgrade: &mut UpgradeFn<'_>,
    ) -> StorageResult<Self> {
        let bytes = backend.read_all()?;
        let replayed = replay(&bytes)?;
        if replayed.torn_tail {
            warn!(
                database = name,
                valid_len = replayed.valid_len,
                journal_len = bytes.len(),
                "truncating torn journal tail"
            );
            backend.truncate(replayed.valid_len)?;
        }

        let mut state = DatabaseState::default();
        for op in replayed.entries.iter().flat_map(|entry| entry.ops.iter()) {
            state
                .apply(op)
                .map_err(|e| StorageError::corrupted(format!("journal replay failed: {e}")))?;
        }

        if version == 0 || version < state.version {
            return Err(StorageError::VersionMismatch {
                requested: version,
                stored: state.version,
            });
        }

        if version > state.version {
            let mut working = state.clone();
            let mut schema = SchemaUpgrade::new(&mut working, version);
            upgrade(&mut schema)?;
            let ops = schema.finish();
            let frame = encode_frame(&JournalEntry::new(ops))?;
            append_frame(backend.as_mut(), &frame, true).map_err(AppendError::into_inner)?;
            info!(
                database = name,
                from = state.version,
                to = version,
                "upgraded database schema"
            );
            state = working;
        }

        let connection = Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            state: RwLock::new(state),
            journal: Mutex::new(backend),
            writer: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            sync_on_commit,
        };
        info!(
            database = name,
            connection = %connection.id,
            version,
            stores = connection.store_names().len(),
            "opened connection"
        );
        Ok(connection)
    }

    /// Returns the unique identifier of this connection.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the schema version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    /// Returns the names of all object stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state.read().stores.keys().cloned().collect()
    }

    /// Returns true if an object store with this name exists.
    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.state.read().stores.contains_key(name)
    }

    /// Returns the journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn journal_size(&self) -> StorageResult<u64> {
        self.journal.lock().size()
    }

    /// Closes the connection. Later transactions fail with
    /// [`StorageError::Closed`]. Closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(database = %self.name, connection = %self.id, "closed connection");
        }
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Begins a read-only transaction over `stores`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] if the connection is closed and
    /// [`StorageError::StoreNotFound`] for an unknown store name.
    pub fn begin_read(&self, stores: &[&str]) -> StorageResult<ReadTransaction<'_>> {
        let scope = self.scope(stores)?;
        Ok(ReadTransaction { conn: self, scope })
    }

    /// Begins a read-write transaction over `stores`.
    ///
    /// Waits until no other read-write transaction is active on this
    /// connection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] if the connection is closed and
    /// [`StorageError::StoreNotFound`] for an unknown store name.
    pub async fn begin_write(&self, stores: &[&str]) -> StorageResult<WriteTransaction<'_>> {
        let scope = self.scope(stores)?;
        let guard = self.writer.lock().await;
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        Ok(WriteTransaction {
            conn: self,
            _writer: guard,
            scope,
            ops: Vec::new(),
            overlay: BTreeMap::new(),
            next_keys: BTreeMap::new(),
            finished: false,
        })
    }

    fn scope(&self, stores: &[&str]) -> StorageResult<Vec<String>> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        let state = self.state.read();
        stores
            .iter()
            .map(|name| state.store(name).map(|_| (*name).to_string()))
            .collect()
    }
}

fn check_scope(scope: &[String], store: &str) -> StorageResult<()> {
    if scope.iter().any(|s| s == store) {
        Ok(())
    } else {
        Err(StorageError::StoreNotInScope {
            name: store.to_string(),
        })
    }
}

/// Why a journal append did not become durable.
enum AppendError {
    /// The journal is back at its previous length.
    RolledBack(StorageError),
    /// Part of the frame may still be in the journal.
    Stuck(StorageError),
}

impl AppendError {
    fn into_inner(self) -> StorageError {
        match self {
            Self::RolledBack(err) | Self::Stuck(err) => err,
        }
    }
}

/// Appends a frame and makes it durable, undoing the append on failure.
fn append_frame(
    backend: &mut dyn JournalBackend,
    frame: &[u8],
    sync: bool,
) -> Result<(), AppendError> {
    let before = backend.size().map_err(AppendError::RolledBack)?;
    let result = match backend.append(frame) {
        Ok(_) if sync => backend.sync(),
        Ok(_) => backend.flush(),
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => Ok(()),
        Err(err) => match backend.truncate(before) {
            Ok(()) => Err(AppendError::RolledBack(err)),
            Err(undo) => {
                error!(error = %undo, "failed to truncate journal after failed append");
                Err(AppendError::Stuck(err))
            }
        },
    }
}

/// A read-only transaction.
///
/// Each call observes the latest committed state.
#[derive(Debug)]
pub struct ReadTransaction<'a> {
    conn: &'a Connection,
    scope: Vec<String>,
}

impl ReadTransaction<'_> {
    /// Reads one record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotInScope`] for a store outside the scope.
    pub fn get(&self, store: &str, key: u64) -> StorageResult<Option<Vec<u8>>> {
        check_scope(&self.scope, store)?;
        let state = self.conn.state.read();
        Ok(state.store(store)?.records.get(&key).cloned())
    }

    /// Reads several records from one consistent state, in key order given.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotInScope`] for a store outside the scope.
    pub fn get_many(&self, store: &str, keys: &[u64]) -> StorageResult<Vec<Option<Vec<u8>>>> {
        check_scope(&self.scope, store)?;
        let state = self.conn.state.read();
        let records = &state.store(store)?.records;
        Ok(keys.iter().map(|key| records.get(key).cloned()).collect())
    }

    /// Reads every record of a store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotInScope`] for a store outside the scope.
    pub fn get_all(&self, store: &str) -> StorageResult<BTreeMap<u64, Vec<u8>>> {
        check_scope(&self.scope, store)?;
        let state = self.conn.state.read();
        Ok(state.store(store)?.records.clone())
    }

    /// Counts the records of a store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotInScope`] for a store outside the scope.
    pub fn count(&self, store: &str) -> StorageResult<usize> {
        check_scope(&self.scope, store)?;
        let state = self.conn.state.read();
        Ok(state.store(store)?.records.len())
    }
}

/// A read-write transaction.
///
/// Writes are staged and become visible atomically on [`commit`](Self::commit).
/// Dropping the transaction without committing aborts it. The connection's
/// writer lock is held until the transaction is finished or dropped.
pub struct WriteTransaction<'a> {
    conn: &'a Connection,
    _writer: tokio::sync::MutexGuard<'a, ()>,
    scope: Vec<String>,
    ops: Vec<JournalOp>,
    overlay: BTreeMap<String, BTreeMap<u64, Option<Vec<u8>>>>,
    next_keys: BTreeMap<String, u64>,
    finished: bool,
}

impl fmt::Debug for WriteTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteTransaction")
            .field("scope", &self.scope)
            .field("staged_ops", &self.ops.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl WriteTransaction<'_> {
    /// Stages a new record under a key from the store's generator.
    ///
    /// Returns the allocated key. Keys allocated by an aborted transaction
    /// are handed out again by the next one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyGeneratorExhausted`] if the store has no
    /// key generator or has run out of keys.
    pub fn add(&mut self, store: &str, value: Vec<u8>) -> StorageResult<u64> {
        self.ensure_active(store)?;

        let committed_next = {
            let state = self.conn.state.read();
            let target = state.store(store)?;
            if !target.options.auto_increment {
                return Err(StorageError::KeyGeneratorExhausted {
                    name: store.to_string(),
                });
            }
            target.next_key
        };

        let key = *self.next_keys.get(store).unwrap_or(&committed_next);
        if key == u64::MAX {
            return Err(StorageError::KeyGeneratorExhausted {
                name: store.to_string(),
            });
        }
        self.next_keys.insert(store.to_string(), key + 1);
        self.stage_put(store, key, value);
        Ok(key)
    }

    /// Stages an insert or overwrite under an explicit key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is outside the scope or the transaction
    /// is finished.
    pub fn put(&mut self, store: &str, key: u64, value: Vec<u8>) -> StorageResult<()> {
        self.ensure_active(store)?;
        self.stage_put(store, key, value);
        Ok(())
    }

    /// Stages a deletion. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is outside the scope or the transaction
    /// is finished.
    pub fn delete(&mut self, store: &str, key: u64) -> StorageResult<()> {
        self.ensure_active(store)?;
        self.overlay
            .entry(store.to_string())
            .or_default()
            .insert(key, None);
        self.ops.push(JournalOp::Delete {
            store: store.to_string(),
            key,
        });
        Ok(())
    }

    /// Reads one record, including writes staged by this transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is outside the scope or the transaction
    /// is finished.
    pub fn get(&self, store: &str, key: u64) -> StorageResult<Option<Vec<u8>>> {
        self.ensure_active(store)?;
        if let Some(staged) = self.overlay.get(store).and_then(|writes| writes.get(&key)) {
            return Ok(staged.clone());
        }
        let state = self.conn.state.read();
        Ok(state.store(store)?.records.get(&key).cloned())
    }

    /// Reads every record of a store, including staged writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is outside the scope or the transaction
    /// is finished.
    pub fn get_all(&self, store: &str) -> StorageResult<BTreeMap<u64, Vec<u8>>> {
        self.ensure_active(store)?;
        let mut records = {
            let state = self.conn.state.read();
            state.store(store)?.records.clone()
        };
        if let Some(writes) = self.overlay.get(store) {
            for (key, value) in writes {
                match value {
                    Some(value) => {
                        records.insert(*key, value.clone());
                    }
                    None => {
                        records.remove(key);
                    }
                }
            }
        }
        Ok(records)
    }

    /// Counts the records of a store, including staged writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is outside the scope or the transaction
    /// is finished.
    pub fn count(&self, store: &str) -> StorageResult<usize> {
        Ok(self.get_all(store)?.len())
    }

    /// Commits every staged write atomically.
    ///
    /// The journal frame is durable before the writes become visible. On
    /// error nothing becomes visible and the journal is left as before.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`] if the connection was closed while the
    /// transaction was open, or the backend error that prevented journaling.
    pub fn commit(mut self) -> StorageResult<()> {
        self.finished = true;
        if self.conn.is_closed() {
            return Err(StorageError::Closed);
        }

        let mut ops = std::mem::take(&mut self.ops);
        for (store, next_key) in std::mem::take(&mut self.next_keys) {
            ops.push(JournalOp::Advance { store, next_key });
        }
        if ops.is_empty() {
            return Ok(());
        }

        let frame = encode_frame(&JournalEntry::new(ops.clone()))?;
        {
            let mut journal = self.conn.journal.lock();
            match append_frame(journal.as_mut(), &frame, self.conn.sync_on_commit) {
                Ok(()) => {}
                Err(AppendError::RolledBack(err)) => {
                    warn!(
                        database = %self.conn.name,
                        error = %err,
                        "commit failed; transaction rolled back"
                    );
                    return Err(err);
                }
                Err(AppendError::Stuck(err)) => {
                    // Appending after a partial frame would corrupt the journal.
                    self.conn.closed.store(true, Ordering::SeqCst);
                    error!(
                        database = %self.conn.name,
                        connection = %self.conn.id,
                        error = %err,
                        "commit failed and the journal could not be restored; connection closed"
                    );
                    return Err(err);
                }
            }
        }

        let mut state = self.conn.state.write();
        for op in &ops {
            state.apply(op)?;
        }
        debug!(
            database = %self.conn.name,
            ops = ops.len(),
            bytes = frame.len(),
            "committed transaction"
        );
        Ok(())
    }

    /// Discards every staged write.
    pub fn abort(mut self) {
        self.finished = true;
        debug!(
            database = %self.conn.name,
            staged = self.ops.len(),
            "aborted transaction"
        );
    }

    fn ensure_active(&self, store: &str) -> StorageResult<()> {
        if self.finished {
            return Err(StorageError::TransactionFinished);
        }
        check_scope(&self.scope, store)
    }

    fn stage_put(&mut self, store: &str, key: u64, value: Vec<u8>) {
        self.overlay
            .entry(store.to_string())
            .or_default()
            .insert(key, Some(value.clone()));
        self.ops.push(JournalOp::Put {
            store: store.to_string(),
            key,
            value,
        });
    }
}

impl Drop for WriteTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                database = %self.conn.name,
                staged = self.ops.len(),
                "transaction dropped without commit; discarding writes"
            );
        }
    }
}
