//! Expire command implementation.

use super::{open_existing, CliResult};
use offstore_core::{Expiration, Key};
use std::path::Path;
use tracing::info;

/// Parses an expiration given as milliseconds since the epoch or `never`.
pub fn parse_expiration(value: &str) -> CliResult<Expiration> {
    if value.eq_ignore_ascii_case("never") {
        return Ok(Expiration::NEVER);
    }
    let millis: u64 = value
        .parse()
        .map_err(|_| format!("Invalid expiration {value:?}: expected milliseconds or \"never\""))?;
    Ok(Expiration::from_millis(millis))
}

/// Runs the expire command.
pub async fn run(path: &Path, name: &str, key: u64, expiration: &str) -> CliResult<()> {
    let expiration = parse_expiration(expiration)?;
    let key = Key::from_raw(key);

    let mechanism = open_existing(path, name)?;
    let result = mechanism
        .cell()
        .update_manifest_expiration(key, expiration)
        .await;
    mechanism.destroy().await;
    result?;

    info!(%key, %expiration, "updated manifest expiration");
    println!("✓ Manifest {key} now expires: {expiration}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use offstore_core::{DatabaseConfig, DirectoryProvider, StorageMechanism};
    use offstore_testkit::create_manifest;

    #[test]
    fn parses_millis_and_never() {
        assert_eq!(parse_expiration("500").unwrap(), Expiration::from_millis(500));
        assert_eq!(parse_expiration("never").unwrap(), Expiration::NEVER);
        assert_eq!(parse_expiration("NEVER").unwrap(), Expiration::NEVER);
        assert!(parse_expiration("soon").is_err());
        assert!(parse_expiration("-1").is_err());
    }

    #[tokio::test]
    async fn updates_stored_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryProvider::new(dir.path());
        let key = {
            let mechanism = StorageMechanism::open(&provider, DatabaseConfig::new()).unwrap();
            let keys = mechanism
                .cell()
                .add_manifests(&[create_manifest("original")
                    .with_expiration(Expiration::from_millis(1000))])
                .await
                .unwrap();
            mechanism.destroy().await;
            keys[0]
        };

        run(dir.path(), "offstore", key.as_u64(), "500").await.unwrap();
        assert!(run(dir.path(), "offstore", key.as_u64() + 1, "500").await.is_err());

        let mechanism = StorageMechanism::open(&provider, DatabaseConfig::new()).unwrap();
        let manifests = mechanism.cell().get_manifests(&[key]).await.unwrap();
        assert_eq!(manifests[0].expiration, Expiration::from_millis(500));
        assert_eq!(manifests[0].original_manifest_uri, "original");
        mechanism.destroy().await;
    }
}
