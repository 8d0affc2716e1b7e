//! Opening the offline database with its two stores.

use crate::config::DatabaseConfig;
use crate::error::CoreResult;
use offstore_storage::{Connection, ConnectionProvider, StoreOptions};
use std::sync::Arc;
use tracing::info;

/// Opens the database described by `config`, creating the segment and
/// manifest stores (with auto-increment keys) on first use.
///
/// Stores that already exist are left alone, so raising the version of an
/// existing database only adds what is missing.
///
/// # Errors
///
/// Returns an error if the provider cannot open the database.
pub fn open_database(
    provider: &dyn ConnectionProvider,
    config: &DatabaseConfig,
) -> CoreResult<Arc<Connection>> {
    let stores = [config.segment_store.as_str(), config.manifest_store.as_str()];
    let connection = provider.open(&config.name, config.version, &mut |schema| {
        info!(
            database = %config.name,
            from = schema.old_version(),
            to = schema.new_version(),
            "creating offline stores"
        );
        for store in stores {
            if !schema.has_store(store) {
                schema.create_store(store, StoreOptions::auto_increment())?;
            }
        }
        Ok(())
    })?;
    Ok(connection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offstore_storage::MemoryProvider;

    #[test]
    fn creates_both_stores() {
        let config = DatabaseConfig::default();
        let connection = open_database(&MemoryProvider::new(), &config).unwrap();
        assert!(connection.has_store(&config.segment_store));
        assert!(connection.has_store(&config.manifest_store));
        assert_eq!(connection.version(), config.version);
    }

    #[test]
    fn version_bump_keeps_existing_stores() {
        let provider = MemoryProvider::new();
        let v1 = DatabaseConfig::default();
        open_database(&provider, &v1).unwrap().close();

        let v2 = v1.clone().version(2);
        let connection = open_database(&provider, &v2).unwrap();
        assert_eq!(connection.version(), 2);
        assert_eq!(connection.store_names().len(), 2);
    }
}
