//! Verify command implementation.

use super::{open_existing, CliResult};
use offstore_core::{Connection, Key, ManifestRecord, RecordCodec, SegmentRecord};
use std::collections::BTreeSet;
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of manifests checked.
    pub manifests_checked: usize,
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Segments stored but referenced by no manifest.
    pub orphaned_segments: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub async fn run(path: &Path, name: &str) -> CliResult<()> {
    println!("Verifying database {name} at {:?}", path);
    println!();

    let mechanism = open_existing(path, name)?;
    let config = mechanism.config();
    let result = verify_stores(
        mechanism.connection(),
        &config.segment_store,
        &config.manifest_store,
    );
    mechanism.destroy().await;
    let result = result?;

    print_result(&result);

    println!();
    if result.is_ok() {
        println!("✓ Database verification passed");
        Ok(())
    } else {
        println!("✗ Database verification failed");
        Err("Verification failed".into())
    }
}

/// Decodes every record and checks that each segment key referenced by a
/// manifest has a stored segment.
pub fn verify_stores(
    connection: &Connection,
    segment_store: &str,
    manifest_store: &str,
) -> CliResult<VerifyResult> {
    let txn = connection.begin_read(&[segment_store, manifest_store])?;
    let segments = txn.get_all(segment_store)?;
    let manifests = txn.get_all(manifest_store)?;

    let mut result = VerifyResult::default();
    for (&raw, bytes) in &segments {
        result.segments_checked += 1;
        if let Err(e) = SegmentRecord::decode(segment_store, Key::from_raw(raw), bytes) {
            result.errors.push(e.to_string());
        }
    }

    let mut referenced = BTreeSet::new();
    for (&raw, bytes) in &manifests {
        result.manifests_checked += 1;
        let key = Key::from_raw(raw);
        let manifest = match ManifestRecord::decode(manifest_store, key, bytes) {
            Ok(manifest) => manifest,
            Err(e) => {
                result.errors.push(e.to_string());
                continue;
            }
        };
        for segment in manifest.segment_keys() {
            referenced.insert(segment.as_u64());
            if !segments.contains_key(&segment.as_u64()) {
                result
                    .errors
                    .push(format!("manifest {key} references missing segment {segment}"));
            }
        }
    }

    result.orphaned_segments = segments
        .keys()
        .filter(|raw| !referenced.contains(*raw))
        .count();
    Ok(result)
}

fn print_result(result: &VerifyResult) {
    println!(
        "  Manifests: {}  Segments: {}  Orphaned segments: {}",
        result.manifests_checked, result.segments_checked, result.orphaned_segments
    );
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offstore_core::SegmentReference;
    use offstore_testkit::{create_manifest, create_segment_data, TestStorage};

    #[tokio::test]
    async fn consistent_database_passes() {
        let storage = TestStorage::memory();
        let cell = storage.cell();
        let keys = cell
            .add_segments(&[create_segment_data(&[0]), create_segment_data(&[1])])
            .await
            .unwrap();
        let mut manifest = create_manifest("original-uri-1");
        manifest.streams.truncate(1);
        manifest.streams[0].init_segment_key = None;
        manifest.streams[0].segments = vec![SegmentReference {
            start_ms: 0,
            end_ms: 1000,
            data_key: keys[0],
        }];
        cell.add_manifests(&[manifest]).await.unwrap();

        let config = storage.config();
        let result = verify_stores(
            &storage.connection(),
            &config.segment_store,
            &config.manifest_store,
        )
        .unwrap();
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.manifests_checked, 1);
        assert_eq!(result.segments_checked, 2);
        assert_eq!(result.orphaned_segments, 1);
    }

    #[tokio::test]
    async fn reports_missing_and_corrupt_records() {
        let storage = TestStorage::memory();
        let config = storage.config();
        let connection = storage.connection();

        // The fixture references placeholder segment keys that are not stored.
        storage
            .cell()
            .add_manifests(&[create_manifest("original-uri-1")])
            .await
            .unwrap();
        let mut txn = connection
            .begin_write(&[config.segment_store.as_str()])
            .await
            .unwrap();
        txn.put(&config.segment_store, 500, vec![0xff, 0x00]).unwrap();
        txn.commit().unwrap();

        let result =
            verify_stores(&connection, &config.segment_store, &config.manifest_store).unwrap();
        assert!(!result.is_ok());
        // Eight missing references and one undecodable segment.
        assert_eq!(result.errors.len(), 9);
        assert!(result.errors.iter().any(|e| e.contains("key:500")));
    }
}
