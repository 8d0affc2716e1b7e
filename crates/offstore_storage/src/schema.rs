//! Object stores, schema state and schema upgrades.

use crate::error::{StorageError, StorageResult};
use crate::journal::JournalOp;
use std::collections::BTreeMap;

/// First key handed out by a fresh key generator.
pub const FIRST_GENERATED_KEY: u64 = 1;

/// Options for creating an object store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Whether the store generates keys for added records.
    pub auto_increment: bool,
}

impl StoreOptions {
    /// Options for a store with an auto-increment key generator.
    #[must_use]
    pub const fn auto_increment() -> Self {
        Self {
            auto_increment: true,
        }
    }
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self::auto_increment()
    }
}

/// One named key-value partition.
#[derive(Debug, Clone)]
pub(crate) struct ObjectStore {
    pub(crate) options: StoreOptions,
    pub(crate) next_key: u64,
    pub(crate) records: BTreeMap<u64, Vec<u8>>,
}

impl ObjectStore {
    fn new(options: StoreOptions) -> Self {
        Self {
            options,
            next_key: FIRST_GENERATED_KEY,
            records: BTreeMap::new(),
        }
    }
}

/// Committed state of a database: schema version plus every store.
#[derive(Debug, Clone, Default)]
pub(crate) struct DatabaseState {
    pub(crate) version: u64,
    pub(crate) stores: BTreeMap<String, ObjectStore>,
}

impl DatabaseState {
    pub(crate) fn store(&self, name: &str) -> StorageResult<&ObjectStore> {
        self.stores
            .get(name)
            .ok_or_else(|| StorageError::store_not_found(name))
    }

    /// Applies one journal op. Used both for replay and for commits.
    pub(crate) fn apply(&mut self, op: &JournalOp) -> StorageResult<()> {
        match op {
            JournalOp::SetVersion { version } => {
                self.version = *version;
            }
            JournalOp::CreateStore {
                name,
                auto_increment,
            } => {
                if self.stores.contains_key(name) {
                    return Err(StorageError::StoreExists { name: name.clone() });
                }
                let options = StoreOptions {
                    auto_increment: *auto_increment,
                };
                self.stores.insert(name.clone(), ObjectStore::new(options));
            }
            JournalOp::DeleteStore { name } => {
                if self.stores.remove(name).is_none() {
                    return Err(StorageError::store_not_found(name.as_str()));
                }
            }
            JournalOp::Put { store, key, value } => {
                let target = self.store_mut(store)?;
                target.records.insert(*key, value.clone());
                if target.options.auto_increment && *key >= target.next_key {
                    target.next_key = key.saturating_add(1);
                }
            }
            JournalOp::Delete { store, key } => {
                self.store_mut(store)?.records.remove(key);
            }
            JournalOp::Advance { store, next_key } => {
                let target = self.store_mut(store)?;
                target.next_key = target.next_key.max(*next_key);
            }
        }
        Ok(())
    }

    fn store_mut(&mut self, name: &str) -> StorageResult<&mut ObjectStore> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| StorageError::store_not_found(name))
    }
}

/// Schema changes made inside an upgrade callback.
///
/// Handed to the callback passed to
/// [`ConnectionProvider::open`](crate::ConnectionProvider::open) when the
/// requested version is newer than the stored one. Changes are journaled
/// together with the new version as one atomic frame once the callback
/// returns `Ok`.
#[derive(Debug)]
pub struct SchemaUpgrade<'a> {
    state: &'a mut DatabaseState,
    ops: Vec<JournalOp>,
    old_version: u64,
    new_version: u64,
}

impl<'a> SchemaUpgrade<'a> {
    pub(crate) fn new(state: &'a mut DatabaseState, new_version: u64) -> Self {
        let old_version = state.version;
        Self {
            state,
            ops: Vec::new(),
            old_version,
            new_version,
        }
    }

    /// Version stored before the upgrade (0 for a new database).
    #[must_use]
    pub fn old_version(&self) -> u64 {
        self.old_version
    }

    /// Version being upgraded to.
    #[must_use]
    pub fn new_version(&self) -> u64 {
        self.new_version
    }

    /// Creates an object store.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreExists`] if the name is taken.
    pub fn create_store(&mut self, name: &str, options: StoreOptions) -> StorageResult<()> {
        self.record(JournalOp::CreateStore {
            name: name.to_string(),
            auto_increment: options.auto_increment,
        })
    }

    /// Deletes an object store and all of its records.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::StoreNotFound`] if the store does not exist.
    pub fn delete_store(&mut self, name: &str) -> StorageResult<()> {
        self.record(JournalOp::DeleteStore {
            name: name.to_string(),
        })
    }

    /// Returns true if a store with this name exists.
    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.state.stores.contains_key(name)
    }

    /// Returns the names of all stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state.stores.keys().cloned().collect()
    }

    fn record(&mut self, op: JournalOp) -> StorageResult<()> {
        self.state.apply(&op)?;
        self.ops.push(op);
        Ok(())
    }

    pub(crate) fn finish(mut self) -> Vec<JournalOp> {
        let version = JournalOp::SetVersion {
            version: self.new_version,
        };
        self.state.version = self.new_version;
        self.ops.push(version);
        self.ops
    }
}
