//! Owner of an offline database connection and the cells built on it.

use crate::cell::StorageCell;
use crate::config::DatabaseConfig;
use crate::error::CoreResult;
use crate::schema::open_database;
use offstore_storage::{Connection, ConnectionProvider};
use std::sync::Arc;
use tracing::info;

/// Opens an offline database and hands out its storage cell.
///
/// The mechanism is the owner of the connection: cells borrow it, and only
/// [`destroy`](Self::destroy) (after destroying the cells) closes it.
#[derive(Debug)]
pub struct StorageMechanism {
    config: DatabaseConfig,
    connection: Arc<Connection>,
    cell: Arc<StorageCell>,
}

impl StorageMechanism {
    /// Opens the database and creates its writable cell.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(provider: &dyn ConnectionProvider, config: DatabaseConfig) -> CoreResult<Self> {
        let connection = open_database(provider, &config)?;
        let cell = Arc::new(StorageCell::new(
            Arc::clone(&connection),
            config.cell_config(),
        ));
        Ok(Self {
            config,
            connection,
            cell,
        })
    }

    /// Returns the writable cell.
    #[must_use]
    pub fn cell(&self) -> Arc<StorageCell> {
        Arc::clone(&self.cell)
    }

    /// Returns the shared connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Returns the configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Destroys the cell, then closes the connection. Stored data is kept.
    pub async fn destroy(&self) {
        self.cell.destroy().await;
        self.connection.close();
        info!(database = %self.config.name, "storage mechanism destroyed");
    }

    /// Destroys the mechanism and deletes the database with every record.
    ///
    /// Cells handed out by [`cell`](Self::cell) must be dropped first when the
    /// provider locks open databases (as [`DirectoryProvider`] does).
    ///
    /// [`DirectoryProvider`]: offstore_storage::DirectoryProvider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot delete the database.
    pub async fn erase(self, provider: &dyn ConnectionProvider) -> CoreResult<()> {
        self.destroy().await;
        let Self {
            config,
            connection,
            cell,
        } = self;
        // The journal stays locked until the last handle is gone.
        drop(cell);
        drop(connection);
        provider.delete(&config.name)?;
        info!(database = %config.name, "erased offline database");
        Ok(())
    }
}
