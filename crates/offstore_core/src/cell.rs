//! The storage cell: segments and manifests over one connection.

use crate::codec::RecordCodec;
use crate::config::CellConfig;
use crate::error::{CoreError, CoreResult};
use crate::record::{ManifestRecord, SegmentRecord};
use crate::types::{ensure_all_present, raw_keys, Expiration, Key};
use offstore_storage::Connection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::debug;

/// Storage for the segments and manifests of offline content.
///
/// A cell owns two stores inside one [`Connection`]: a segment store and a
/// manifest store, each with its own key space. It borrows the connection
/// and never closes it; several cells may share one connection.
///
/// ## Guarantees
///
/// - Each add, remove or update call is one atomic transaction: either every
///   record in the batch is written or none is.
/// - Gets fail as a whole with [`CoreError::KeyNotFound`] if any key is
///   missing; no partial results are returned.
/// - Removing a missing key is not an error.
/// - Separate calls are not atomic with each other.
///
/// ## Lifecycle
///
/// Construction does no I/O; store names are checked when an operation opens
/// its transaction. [`destroy`](Self::destroy) waits for in-flight
/// operations and then rejects every later call with
/// [`CoreError::Destroyed`]. Stored data is never touched by destroy.
///
/// # Example
///
/// ```rust,ignore
/// let cell = StorageCell::new(connection, CellConfig::default());
/// let keys = cell.add_segments(&[SegmentRecord::new(vec![0, 1])]).await?;
/// let segments = cell.get_segments(&keys).await?;
/// cell.remove_segments(&keys, |key| println!("removed {key}")).await?;
/// cell.destroy().await;
/// ```
pub struct StorageCell {
    connection: Arc<Connection>,
    config: CellConfig,
    /// `true` once destroyed. Operations hold a read guard while they run.
    destroyed: RwLock<bool>,
}

impl fmt::Debug for StorageCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCell")
            .field("connection", &self.connection.id())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageCell {
    /// Creates a cell over `connection`.
    #[must_use]
    pub fn new(connection: Arc<Connection>, config: CellConfig) -> Self {
        Self {
            connection,
            config,
            destroyed: RwLock::new(false),
        }
    }

    /// Returns the shared connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the name of the segment store.
    #[must_use]
    pub fn segment_store(&self) -> &str {
        &self.config.segment_store
    }

    /// Returns the name of the manifest store.
    #[must_use]
    pub fn manifest_store(&self) -> &str {
        &self.config.manifest_store
    }

    /// Returns true if the cell rejects writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Returns true if no new keys can be created in this cell.
    #[must_use]
    pub fn has_fixed_key_space(&self) -> bool {
        self.config.read_only
    }

    /// Adds segments in one transaction and returns their keys in input order.
    ///
    /// # Errors
    ///
    /// - [`CoreError::OperationNotSupported`] on a read-only cell
    /// - [`CoreError::StoreNotFound`] if the segment store does not exist
    /// - [`CoreError::Storage`] if the backend fails; nothing is written
    pub async fn add_segments(&self, segments: &[SegmentRecord]) -> CoreResult<Vec<Key>> {
        self.add("add_segments", &self.config.segment_store, segments)
            .await
    }

    /// Reads segments in key order.
    ///
    /// # Errors
    ///
    /// [`CoreError::KeyNotFound`] names the first key without a record.
    pub async fn get_segments(&self, keys: &[Key]) -> CoreResult<Vec<SegmentRecord>> {
        self.get(&self.config.segment_store, keys).await
    }

    /// Removes segments in one transaction, then calls `on_remove` once per
    /// key in input order.
    ///
    /// # Errors
    ///
    /// [`CoreError::OperationNotSupported`] on a read-only cell, or a backend
    /// error in which case no key is removed and `on_remove` is not called.
    pub async fn remove_segments<F>(&self, keys: &[Key], on_remove: F) -> CoreResult<()>
    where
        F: FnMut(Key),
    {
        self.remove("remove_segments", &self.config.segment_store, keys, on_remove)
            .await
    }

    /// Adds manifests in one transaction and returns their keys in input order.
    ///
    /// # Errors
    ///
    /// Same as [`add_segments`](Self::add_segments).
    pub async fn add_manifests(&self, manifests: &[ManifestRecord]) -> CoreResult<Vec<Key>> {
        self.add("add_manifests", &self.config.manifest_store, manifests)
            .await
    }

    /// Reads manifests in key order.
    ///
    /// # Errors
    ///
    /// [`CoreError::KeyNotFound`] names the first key without a record.
    pub async fn get_manifests(&self, keys: &[Key]) -> CoreResult<Vec<ManifestRecord>> {
        self.get(&self.config.manifest_store, keys).await
    }

    /// Reads every manifest in the manifest store.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if a stored manifest does not
    /// decode, or a backend error.
    pub async fn get_all_manifests(&self) -> CoreResult<HashMap<Key, ManifestRecord>> {
        let _active = self.enter().await?;
        let store = self.config.manifest_store.as_str();
        let txn = self.connection.begin_read(&[store])?;
        let manifests = txn
            .get_all(store)?
            .into_iter()
            .map(|(raw, bytes)| {
                let key = Key::from_raw(raw);
                ManifestRecord::decode(store, key, &bytes).map(|manifest| (key, manifest))
            })
            .collect::<CoreResult<HashMap<_, _>>>()?;
        debug!(store, count = manifests.len(), "listed manifests");
        Ok(manifests)
    }

    /// Removes manifests in one transaction, then calls `on_remove` once per
    /// key in input order.
    ///
    /// # Errors
    ///
    /// Same as [`remove_segments`](Self::remove_segments).
    pub async fn remove_manifests<F>(&self, keys: &[Key], on_remove: F) -> CoreResult<()>
    where
        F: FnMut(Key),
    {
        self.remove("remove_manifests", &self.config.manifest_store, keys, on_remove)
            .await
    }

    /// Replaces the expiration of one manifest, leaving every other field
    /// unchanged.
    ///
    /// The read and the write share one transaction, so an update that runs
    /// after a removal of the same key fails instead of restoring it.
    ///
    /// # Errors
    ///
    /// - [`CoreError::KeyNotFound`] if no manifest has this key
    /// - [`CoreError::OperationNotSupported`] on a read-only cell
    pub async fn update_manifest_expiration(
        &self,
        key: Key,
        expiration: Expiration,
    ) -> CoreResult<()> {
        let _active = self.enter().await?;
        let store = self.config.manifest_store.as_str();
        self.ensure_writable("update_manifest_expiration", store)?;

        let mut txn = self.connection.begin_write(&[store]).await?;
        let bytes = txn
            .get(store, key.as_u64())?
            .ok_or_else(|| CoreError::key_not_found(store, key))?;
        let mut manifest = ManifestRecord::decode(store, key, &bytes)?;
        manifest.expiration = expiration;
        txn.put(store, key.as_u64(), manifest.encode()?)?;
        txn.commit()?;

        debug!(store, %key, %expiration, "updated manifest expiration");
        Ok(())
    }

    /// Destroys the cell.
    ///
    /// Waits for in-flight operations, then rejects every later operation
    /// with [`CoreError::Destroyed`]. Neither closes the connection nor
    /// deletes stored records. Calling it again is a no-op.
    pub async fn destroy(&self) {
        let mut destroyed = self.destroyed.write().await;
        if !*destroyed {
            *destroyed = true;
            debug!(
                connection = %self.connection.id(),
                segment_store = %self.config.segment_store,
                manifest_store = %self.config.manifest_store,
                "destroyed storage cell"
            );
        }
    }

    /// Returns true once [`destroy`](Self::destroy) has completed.
    pub async fn is_destroyed(&self) -> bool {
        *self.destroyed.read().await
    }

    async fn enter(&self) -> CoreResult<RwLockReadGuard<'_, bool>> {
        let guard = self.destroyed.read().await;
        if *guard {
            return Err(CoreError::Destroyed);
        }
        Ok(guard)
    }

    fn ensure_writable(&self, operation: &'static str, store: &str) -> CoreResult<()> {
        if self.config.read_only {
            return Err(CoreError::not_supported(operation, store));
        }
        Ok(())
    }

    async fn add<R: RecordCodec>(
        &self,
        operation: &'static str,
        store: &str,
        records: &[R],
    ) -> CoreResult<Vec<Key>> {
        let _active = self.enter().await?;
        self.ensure_writable(operation, store)?;

        let encoded = records
            .iter()
            .map(RecordCodec::encode)
            .collect::<CoreResult<Vec<_>>>()?;

        let mut txn = self.connection.begin_write(&[store]).await?;
        let mut keys = Vec::with_capacity(encoded.len());
        for value in encoded {
            keys.push(Key::from_raw(txn.add(store, value)?));
        }
        txn.commit()?;

        debug!(store, count = keys.len(), "added records");
        Ok(keys)
    }

    async fn get<R: RecordCodec>(&self, store: &str, keys: &[Key]) -> CoreResult<Vec<R>> {
        let _active = self.enter().await?;
        let txn = self.connection.begin_read(&[store])?;
        let found = txn.get_many(store, &raw_keys(keys))?;
        let records = ensure_all_present(store, keys, found)?
            .into_iter()
            .map(|(key, bytes)| R::decode(store, key, &bytes))
            .collect::<CoreResult<Vec<_>>>()?;

        debug!(store, count = records.len(), "read records");
        Ok(records)
    }

    async fn remove<F>(
        &self,
        operation: &'static str,
        store: &str,
        keys: &[Key],
        mut on_remove: F,
    ) -> CoreResult<()>
    where
        F: FnMut(Key),
    {
        let _active = self.enter().await?;
        self.ensure_writable(operation, store)?;

        let mut txn = self.connection.begin_write(&[store]).await?;
        for key in keys {
            txn.delete(store, key.as_u64())?;
        }
        txn.commit()?;

        debug!(store, count = keys.len(), "removed records");
        keys.iter().copied().for_each(&mut on_remove);
        Ok(())
    }
}
