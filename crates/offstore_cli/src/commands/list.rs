//! List command implementation.

use super::{open_existing, read_only_cell, CliResult};
use offstore_core::ManifestRecord;
use serde::Serialize;
use std::path::Path;

/// One stored manifest, as listed.
#[derive(Debug, Serialize)]
pub struct ManifestSummary {
    /// Manifest key.
    pub key: u64,
    /// URI the content was downloaded from.
    pub original_manifest_uri: String,
    /// Duration in milliseconds.
    pub duration_ms: u64,
    /// Stored size in bytes.
    pub size: u64,
    /// Expiration in milliseconds since the epoch; absent if it never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_ms: Option<u64>,
    /// Number of streams.
    pub streams: usize,
    /// Number of referenced segments, init segments included.
    pub segments: usize,
}

impl ManifestSummary {
    fn new(key: u64, manifest: &ManifestRecord) -> Self {
        Self {
            key,
            original_manifest_uri: manifest.original_manifest_uri.clone(),
            duration_ms: manifest.duration_ms,
            size: manifest.size,
            expiration_ms: (!manifest.expiration.is_never())
                .then(|| manifest.expiration.as_millis()),
            streams: manifest.streams.len(),
            segments: manifest.segment_keys().len(),
        }
    }
}

/// Runs the list command.
pub async fn run(path: &Path, name: &str, format: &str) -> CliResult<()> {
    let summaries = collect(path, name).await?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => {
            print_text_output(&summaries);
        }
    }

    Ok(())
}

/// Reads every manifest, ordered by key.
pub async fn collect(path: &Path, name: &str) -> CliResult<Vec<ManifestSummary>> {
    let mechanism = open_existing(path, name)?;
    let cell = read_only_cell(&mechanism);
    let manifests = cell.get_all_manifests().await;
    cell.destroy().await;
    mechanism.destroy().await;

    let mut summaries: Vec<ManifestSummary> = manifests?
        .iter()
        .map(|(key, manifest)| ManifestSummary::new(key.as_u64(), manifest))
        .collect();
    summaries.sort_by_key(|summary| summary.key);
    Ok(summaries)
}

fn print_text_output(summaries: &[ManifestSummary]) {
    if summaries.is_empty() {
        println!("No manifests stored");
        return;
    }

    println!(
        "{:>8}  {:>10}  {:>12}  {:>15}  {:>7}  {:>8}  URI",
        "KEY", "DURATION", "SIZE", "EXPIRES", "STREAMS", "SEGMENTS"
    );
    for summary in summaries {
        let expires = summary
            .expiration_ms
            .map_or_else(|| "never".to_string(), |ms| ms.to_string());
        println!(
            "{:>8}  {:>9}s  {:>12}  {:>15}  {:>7}  {:>8}  {}",
            summary.key,
            summary.duration_ms / 1000,
            summary.size,
            expires,
            summary.streams,
            summary.segments,
            summary.original_manifest_uri
        );
    }
    println!();
    println!("{} manifest(s)", summaries.len());
}
