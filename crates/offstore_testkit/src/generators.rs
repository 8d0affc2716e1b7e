//! Property-based test generators using proptest.

use offstore_core::{
    ByteRange, ContentType, Expiration, Key, ManifestRecord, SegmentRecord, SegmentReference,
    StreamRecord,
};
use proptest::prelude::*;

/// Strategy for keys.
pub fn key_strategy() -> impl Strategy<Value = Key> {
    (1u64..1_000_000).prop_map(Key::from_raw)
}

/// Strategy for expirations, including [`Expiration::NEVER`].
pub fn expiration_strategy() -> impl Strategy<Value = Expiration> {
    prop_oneof![
        Just(Expiration::NEVER),
        (0u64..4_000_000_000_000).prop_map(Expiration::from_millis),
    ]
}

/// Strategy for segments with up to 4 KiB of payload.
pub fn segment_strategy() -> impl Strategy<Value = SegmentRecord> {
    (
        prop::collection::vec(any::<u8>(), 0..4096),
        prop::option::of((0u64..1 << 32, prop::option::of(0u64..1 << 32))),
    )
        .prop_map(|(data, range)| {
            let segment = SegmentRecord::new(data);
            match range {
                Some((start, end)) => segment.with_byte_range(ByteRange::new(start, end)),
                None => segment,
            }
        })
}

fn content_type_strategy() -> impl Strategy<Value = ContentType> {
    prop_oneof![
        Just(ContentType::Audio),
        Just(ContentType::Video),
        Just(ContentType::Text),
    ]
}

fn stream_strategy() -> impl Strategy<Value = StreamRecord> {
    (
        any::<u32>(),
        content_type_strategy(),
        "(audio|video|text)/[a-z0-9]{1,8}",
        "[a-z0-9.]{0,16}",
        prop::option::of("[a-z]{2}"),
        prop::option::of(key_strategy()),
        prop::collection::vec((0u64..100_000, key_strategy()), 0..8),
    )
        .prop_map(
            |(id, content_type, mime_type, codecs, language, init_segment_key, refs)| {
                StreamRecord {
                    id,
                    content_type,
                    mime_type,
                    codecs,
                    language,
                    init_segment_key,
                    segments: refs
                        .into_iter()
                        .map(|(start_ms, data_key)| SegmentReference {
                            start_ms,
                            end_ms: start_ms + 2000,
                            data_key,
                        })
                        .collect(),
                }
            },
        )
}

/// Strategy for manifests with up to three streams.
pub fn manifest_strategy() -> impl Strategy<Value = ManifestRecord> {
    (
        "[a-z]{1,10}://[a-z0-9./]{1,40}",
        any::<u64>(),
        any::<u64>(),
        expiration_strategy(),
        prop::collection::vec(stream_strategy(), 0..3),
        prop::collection::vec("[a-z0-9-]{1,12}", 0..3),
        prop::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..4),
    )
        .prop_map(
            |(uri, duration_ms, size, expiration, streams, session_ids, app_metadata)| {
                ManifestRecord {
                    original_manifest_uri: uri,
                    duration_ms,
                    size,
                    expiration,
                    streams,
                    session_ids,
                    app_metadata,
                }
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_segment_ranges_are_valid(segment in segment_strategy()) {
            if let Some(range) = segment.byte_range {
                prop_assert!(range.start < 1 << 32);
            }
        }

        #[test]
        fn generated_manifests_reference_streams(manifest in manifest_strategy()) {
            let expected: usize = manifest
                .streams
                .iter()
                .map(|s| s.segments.len() + usize::from(s.init_segment_key.is_some()))
                .sum();
            prop_assert_eq!(manifest.segment_keys().len(), expected);
        }
    }
}
