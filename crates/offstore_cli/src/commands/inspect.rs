//! Inspect command implementation.

use super::{existing_journal, open_existing, CliResult};
use offstore_storage::journal;
use serde::Serialize;
use std::path::Path;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal file path.
    pub path: String,
    /// Database name.
    pub name: String,
    /// Schema version.
    pub version: u64,
    /// Journal size in bytes.
    pub journal_size: u64,
    /// Number of committed frames in the journal.
    pub frame_count: usize,
    /// Whether the journal ended in a partially written frame.
    pub torn_tail: bool,
    /// Statistics per store.
    pub stores: Vec<StoreStats>,
}

/// Statistics for a single store.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    /// Store name.
    pub name: String,
    /// Number of records.
    pub record_count: usize,
    /// Total encoded size of the records in bytes.
    pub data_size: usize,
}

/// Runs the inspect command.
pub async fn run(path: &Path, name: &str, format: &str) -> CliResult<()> {
    let result = collect(path, name).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers journal and store statistics.
///
/// The journal is scanned before the database is opened, since opening
/// truncates a torn tail.
pub async fn collect(path: &Path, name: &str) -> CliResult<InspectResult> {
    let journal_path = existing_journal(path, name)?;
    let bytes = std::fs::read(&journal_path)?;
    let replay = journal::replay(&bytes)?;

    let mechanism = open_existing(path, name)?;
    let connection = mechanism.connection();
    let mut stores = Vec::new();
    for store in connection.store_names() {
        let txn = connection.begin_read(&[store.as_str()])?;
        let records = txn.get_all(&store)?;
        stores.push(StoreStats {
            record_count: records.len(),
            data_size: records.values().map(Vec::len).sum(),
            name: store,
        });
    }
    let version = connection.version();
    mechanism.destroy().await;

    Ok(InspectResult {
        path: journal_path.display().to_string(),
        name: name.to_string(),
        version,
        journal_size: bytes.len() as u64,
        frame_count: replay.entries.len(),
        torn_tail: replay.torn_tail,
        stores,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Database: {} ({})", result.name, result.path);
    println!("  Schema version: {}", result.version);
    println!();
    println!("Journal:");
    println!("  Size:   {} bytes", result.journal_size);
    println!("  Frames: {}", result.frame_count);
    if result.torn_tail {
        println!("  Torn tail: yes (truncated on open)");
    }
    println!();
    println!("Stores:");
    for store in &result.stores {
        println!(
            "  {:<20} {:>8} records  {:>12} bytes",
            store.name, store.record_count, store.data_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offstore_core::{DatabaseConfig, DirectoryProvider, StorageMechanism};
    use offstore_testkit::{create_manifest, create_segment_data};
    use std::fs::OpenOptions;
    use std::io::Write;

    async fn populate(path: &Path) {
        let provider = DirectoryProvider::new(path);
        let mechanism = StorageMechanism::open(&provider, DatabaseConfig::new()).unwrap();
        let cell = mechanism.cell();
        cell.add_segments(&[create_segment_data(&[0, 1]), create_segment_data(&[2])])
            .await
            .unwrap();
        cell.add_manifests(&[create_manifest("original-uri-1")])
            .await
            .unwrap();
        mechanism.destroy().await;
    }

    #[tokio::test]
    async fn reports_stores_and_frames() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path()).await;

        let result = collect(dir.path(), "offstore").await.unwrap();
        assert_eq!(result.version, 1);
        // Schema bootstrap plus two commits.
        assert_eq!(result.frame_count, 3);
        assert!(!result.torn_tail);

        let segments = result
            .stores
            .iter()
            .find(|s| s.name == "segment-store")
            .unwrap();
        assert_eq!(segments.record_count, 2);
        let manifests = result
            .stores
            .iter()
            .find(|s| s.name == "manifest-store")
            .unwrap();
        assert_eq!(manifests.record_count, 1);
    }

    #[tokio::test]
    async fn reports_torn_tail_before_repair() {
        let dir = tempfile::tempdir().unwrap();
        populate(dir.path()).await;
        let journal = dir.path().join("offstore.journal");
        OpenOptions::new()
            .append(true)
            .open(&journal)
            .unwrap()
            .write_all(b"OSJF\x01")
            .unwrap();

        let result = collect(dir.path(), "offstore").await.unwrap();
        assert!(result.torn_tail);
        assert_eq!(result.frame_count, 3);

        let repaired = collect(dir.path(), "offstore").await.unwrap();
        assert!(!repaired.torn_tail);
    }
}
