//! Serde adapter that stores `Vec<u8>` fields as CBOR byte strings.
//!
//! Use with `#[serde(with = "offstore_storage::raw_bytes")]`. Without it serde
//! writes byte vectors as arrays of integers, which roughly doubles the size
//! of media payloads.

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;

/// Serializes a byte slice as a byte string.
///
/// # Errors
///
/// Propagates the serializer's error.
pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_bytes(bytes)
}

/// Deserializes a byte string, also accepting a sequence of integers.
///
/// # Errors
///
/// Propagates the deserializer's error.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    deserializer.deserialize_byte_buf(BytesVisitor)
}

struct BytesVisitor;

impl<'de> Visitor<'de> for BytesVisitor {
    type Value = Vec<u8>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(v.to_vec())
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(v)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(byte) = seq.next_element::<u8>()? {
            out.push(byte);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        #[serde(with = "crate::raw_bytes")]
        data: Vec<u8>,
    }

    #[derive(Serialize)]
    struct PlainPayload {
        data: Vec<u8>,
    }

    #[test]
    fn byte_string_is_smaller_than_array() {
        let data: Vec<u8> = (0..=255).collect();
        let mut raw = Vec::new();
        ciborium::into_writer(&Payload { data: data.clone() }, &mut raw).unwrap();
        let mut plain = Vec::new();
        ciborium::into_writer(&PlainPayload { data }, &mut plain).unwrap();
        assert!(raw.len() < plain.len());
    }
}
