//! Remove command implementation.

use super::{open_existing, CliResult};
use offstore_core::{Key, StorageCell};
use std::path::Path;
use tracing::info;

/// What a removal deleted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RemoveStats {
    /// Segment keys processed.
    pub segments_removed: usize,
    /// Whether the manifest itself was removed.
    pub manifest_removed: bool,
}

/// Runs the remove command.
pub async fn run(path: &Path, name: &str, key: u64) -> CliResult<()> {
    let key = Key::from_raw(key);
    let mechanism = open_existing(path, name)?;
    let result = remove_content(&mechanism.cell(), key).await;
    mechanism.destroy().await;
    let stats = result?;

    println!("✓ Removed manifest {key}");
    println!("  Segments removed: {}", stats.segments_removed);
    Ok(())
}

/// Removes the manifest stored under `key` and every segment it references.
///
/// Segments go first, so an interrupted removal leaves a manifest that can
/// be removed again rather than unreachable segments.
pub async fn remove_content(cell: &StorageCell, key: Key) -> CliResult<RemoveStats> {
    // A missing key fails with KeyNotFound, so one key yields one record.
    let manifest = cell.get_manifests(&[key]).await?.swap_remove(0);

    let mut segment_keys = manifest.segment_keys();
    segment_keys.sort();
    segment_keys.dedup();

    let mut stats = RemoveStats::default();
    cell.remove_segments(&segment_keys, |_| stats.segments_removed += 1)
        .await?;
    cell.remove_manifests(&[key], |_| stats.manifest_removed = true)
        .await?;

    info!(
        %key,
        segments = stats.segments_removed,
        uri = %manifest.original_manifest_uri,
        "removed offline content"
    );
    Ok(stats)
}
