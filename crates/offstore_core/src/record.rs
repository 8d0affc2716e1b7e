//! Records kept by a storage cell.
//!
//! Two record kinds exist: [`SegmentRecord`] holds the bytes of one media
//! chunk and never changes after it is stored, [`ManifestRecord`] describes
//! a downloaded presentation and points at its segments by [`Key`].

use crate::types::{Expiration, Key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive byte range of a segment inside its original resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    /// First byte.
    pub start: u64,
    /// Last byte, or `None` for "until the end of the resource".
    pub end: Option<u64>,
}

impl ByteRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered, if the range is closed.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start) + 1)
    }
}

/// One stored media chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Raw chunk bytes.
    #[serde(with = "offstore_storage::raw_bytes")]
    pub data: Vec<u8>,
    /// Where the bytes came from in the original resource.
    #[serde(default)]
    pub byte_range: Option<ByteRange>,
}

impl SegmentRecord {
    /// Creates a segment holding `data`.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            byte_range: None,
        }
    }

    /// Sets the byte range.
    #[must_use]
    pub fn with_byte_range(mut self, range: ByteRange) -> Self {
        self.byte_range = Some(range);
        self
    }

    /// Returns the payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Kind of media carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Audio.
    Audio,
    /// Video.
    Video,
    /// Subtitles or captions.
    Text,
}

/// Timing of one segment and where its bytes are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentReference {
    /// Presentation start time in milliseconds.
    pub start_ms: u64,
    /// Presentation end time in milliseconds.
    pub end_ms: u64,
    /// Key of the [`SegmentRecord`] in the segment store.
    pub data_key: Key,
}

/// One track of a stored presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Stream identifier, unique within its manifest.
    pub id: u32,
    /// Media kind.
    pub content_type: ContentType,
    /// MIME type, e.g. `video/mp4`.
    pub mime_type: String,
    /// Codec string, e.g. `avc1.42c01e`.
    pub codecs: String,
    /// Language tag, if any.
    #[serde(default)]
    pub language: Option<String>,
    /// Key of the initialization segment, if the stream has one.
    #[serde(default)]
    pub init_segment_key: Option<Key>,
    /// Media segments in presentation order.
    #[serde(default)]
    pub segments: Vec<SegmentReference>,
}

/// A downloaded presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    /// URI the presentation was downloaded from.
    pub original_manifest_uri: String,
    /// Presentation duration in milliseconds.
    pub duration_ms: u64,
    /// Total size of all stored segments in bytes.
    pub size: u64,
    /// When the stored content stops being playable.
    pub expiration: Expiration,
    /// Stored tracks.
    #[serde(default)]
    pub streams: Vec<StreamRecord>,
    /// License session identifiers tied to this content.
    #[serde(default)]
    pub session_ids: Vec<String>,
    /// Application-defined metadata.
    #[serde(default)]
    pub app_metadata: BTreeMap<String, String>,
}

impl ManifestRecord {
    /// Creates an empty manifest for `original_manifest_uri` that never
    /// expires.
    #[must_use]
    pub fn new(original_manifest_uri: impl Into<String>) -> Self {
        Self {
            original_manifest_uri: original_manifest_uri.into(),
            duration_ms: 0,
            size: 0,
            expiration: Expiration::NEVER,
            streams: Vec::new(),
            session_ids: Vec::new(),
            app_metadata: BTreeMap::new(),
        }
    }

    /// Sets the expiration.
    #[must_use]
    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    /// Returns every segment key the manifest references: each stream's
    /// init segment followed by its media segments, in stream order.
    #[must_use]
    pub fn segment_keys(&self) -> Vec<Key> {
        self.streams
            .iter()
            .flat_map(|stream| {
                stream
                    .init_segment_key
                    .into_iter()
                    .chain(stream.segments.iter().map(|segment| segment.data_key))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(id: u32, init: Option<u64>, keys: &[u64]) -> StreamRecord {
        StreamRecord {
            id,
            content_type: ContentType::Video,
            mime_type: "video/mp4".into(),
            codecs: "avc1.42c01e".into(),
            language: None,
            init_segment_key: init.map(Key::from_raw),
            segments: keys
                .iter()
                .enumerate()
                .map(|(i, key)| SegmentReference {
                    start_ms: i as u64 * 2000,
                    end_ms: (i as u64 + 1) * 2000,
                    data_key: Key::from_raw(*key),
                })
                .collect(),
        }
    }

    #[test]
    fn segment_keys_include_init_segments() {
        let mut manifest = ManifestRecord::new("https://example.com/a.mpd");
        manifest.streams = vec![stream(1, Some(10), &[11, 12]), stream(2, None, &[20])];

        let keys: Vec<u64> = manifest.segment_keys().iter().map(|k| k.as_u64()).collect();
        assert_eq!(keys, vec![10, 11, 12, 20]);
    }

    #[test]
    fn new_manifest_never_expires() {
        let manifest = ManifestRecord::new("uri");
        assert!(manifest.expiration.is_never());
        assert!(manifest.segment_keys().is_empty());
    }

    #[test]
    fn byte_range_len() {
        assert_eq!(ByteRange::new(0, Some(99)).len(), Some(100));
        assert_eq!(ByteRange::new(5, None).len(), None);
    }

    #[test]
    fn segment_builder() {
        let segment = SegmentRecord::new(vec![1, 2]).with_byte_range(ByteRange::new(0, Some(1)));
        assert_eq!(segment.len(), 2);
        assert!(!segment.is_empty());
        assert_eq!(segment.byte_range, Some(ByteRange::new(0, Some(1))));
    }
}
