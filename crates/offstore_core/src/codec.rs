//! Record codec for values handed to the backend.

use crate::error::{CoreError, CoreResult};
use crate::record::{ManifestRecord, SegmentRecord};
use crate::types::Key;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Types a storage cell can keep in a store.
///
/// The backend stores opaque bytes; records are CBOR-encoded through serde.
/// Encoding is deterministic for a given value, so re-encoding an unchanged
/// field yields the same bytes.
pub trait RecordCodec: Serialize + DeserializeOwned + Sized {
    /// Encodes the record to CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Encode`] if serialization fails.
    fn encode(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes).map_err(|e| CoreError::Encode {
            message: e.to_string(),
        })?;
        Ok(bytes)
    }

    /// Decodes a record read from `store` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CorruptRecord`] if the bytes are not a valid
    /// record of this type.
    fn decode(store: &str, key: Key, bytes: &[u8]) -> CoreResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::corrupt_record(store, key, e.to_string()))
    }
}

impl RecordCodec for SegmentRecord {}

impl RecordCodec for ManifestRecord {}
