//! CLI command implementations.

pub mod expire;
pub mod inspect;
pub mod list;
pub mod remove;
pub mod verify;

use offstore_core::{DatabaseConfig, DirectoryProvider, StorageCell, StorageMechanism};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type shared by the commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Returns the journal of database `name` under `path`, failing if it does
/// not exist.
pub fn existing_journal(path: &Path, name: &str) -> CliResult<PathBuf> {
    let journal = DirectoryProvider::new(path).journal_path(name)?;
    if !journal.exists() {
        return Err(format!("No database found at {:?}", journal).into());
    }
    Ok(journal)
}

/// Opens an existing database. Never creates one.
pub fn open_existing(path: &Path, name: &str) -> CliResult<StorageMechanism> {
    existing_journal(path, name)?;
    let provider = DirectoryProvider::new(path);
    Ok(StorageMechanism::open(
        &provider,
        DatabaseConfig::new().name(name),
    )?)
}

/// Creates a read-only cell over the mechanism's stores.
pub fn read_only_cell(mechanism: &StorageMechanism) -> StorageCell {
    StorageCell::new(
        Arc::clone(mechanism.connection()),
        mechanism.config().cell_config().read_only(true),
    )
}
