//! Journal frame format and replay.
//!
//! Every committed transaction (and every schema upgrade) becomes one frame:
//!
//! ```text
//! | magic "OSJF" (4) | version u16 (2) | len u32 (4) | CBOR payload (len) | crc32 (4) |
//! ```
//!
//! Integers are little-endian. The CRC covers the header and the payload.
//! A frame that was only partly written when the process died is a *torn
//! tail*: replay stops before it and the connection truncates it away.

use crate::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};

/// Magic bytes opening every journal frame.
pub const FRAME_MAGIC: [u8; 4] = *b"OSJF";

/// Current journal format version.
pub const JOURNAL_VERSION: u16 = 1;

/// Size of the frame header (magic + version + length).
pub const FRAME_HEADER_SIZE: usize = 10;

/// Size of the frame trailer (CRC32).
pub const FRAME_TRAILER_SIZE: usize = 4;

/// A single mutation recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalOp {
    /// Schema version after an upgrade.
    SetVersion {
        /// New schema version.
        version: u64,
    },
    /// Creation of an object store.
    CreateStore {
        /// Store name.
        name: String,
        /// Whether the store owns a key generator.
        auto_increment: bool,
    },
    /// Deletion of an object store and all its records.
    DeleteStore {
        /// Store name.
        name: String,
    },
    /// Insert or overwrite of a record.
    Put {
        /// Store name.
        store: String,
        /// Record key.
        key: u64,
        /// Opaque record value.
        #[serde(with = "crate::raw_bytes")]
        value: Vec<u8>,
    },
    /// Deletion of a record.
    Delete {
        /// Store name.
        store: String,
        /// Record key.
        key: u64,
    },
    /// Key generator position after a transaction allocated keys.
    Advance {
        /// Store name.
        store: String,
        /// Next key the generator hands out.
        next_key: u64,
    },
}

/// The payload of one frame: the ops of one committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Operations in application order.
    pub ops: Vec<JournalOp>,
}

impl JournalEntry {
    /// Creates an entry from a list of ops.
    #[must_use]
    pub fn new(ops: Vec<JournalOp>) -> Self {
        Self { ops }
    }

    /// Returns true if the entry carries no ops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Result of scanning a journal.
#[derive(Debug, Default)]
pub struct Replay {
    /// Entries of every intact frame, in journal order.
    pub entries: Vec<JournalEntry>,
    /// Byte length of the intact prefix.
    pub valid_len: u64,
    /// Whether an incomplete frame followed the intact prefix.
    pub torn_tail: bool,
}

/// Encodes an entry into a complete frame.
///
/// # Errors
///
/// Returns [`StorageError::Codec`] if the entry cannot be serialized or its
/// payload exceeds `u32::MAX` bytes.
pub fn encode_frame(entry: &JournalEntry) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(entry, &mut payload)
        .map_err(|e| StorageError::codec(format!("journal entry encode failed: {e}")))?;

    let len = u32::try_from(payload.len()).map_err(|_| {
        StorageError::codec(format!(
            "journal entry too large: {} bytes",
            payload.len()
        ))
    })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len() + FRAME_TRAILER_SIZE);
    frame.extend_from_slice(&FRAME_MAGIC);
    frame.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    let crc = compute_crc32(&frame);
    frame.extend_from_slice(&crc.to_le_bytes());
    Ok(frame)
}

/// Scans journal bytes and decodes every intact frame.
///
/// An incomplete last frame, or a last frame whose checksum does not match,
/// is reported as a torn tail. Damage anywhere before the last frame is
/// corruption.
///
/// # Errors
///
/// Returns [`StorageError::Corrupted`] for bad magic, unknown versions or a
/// checksum mismatch before the tail, and [`StorageError::Codec`] if an
/// intact frame does not decode.
pub fn replay(bytes: &[u8]) -> StorageResult<Replay> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < FRAME_HEADER_SIZE {
            return Ok(torn(entries, offset));
        }
        if rest[0..4] != FRAME_MAGIC {
            return Err(StorageError::corrupted(format!(
                "bad frame magic at offset {offset}"
            )));
        }

        let version = u16::from_le_bytes([rest[4], rest[5]]);
        if version != JOURNAL_VERSION {
            return Err(StorageError::corrupted(format!(
                "unsupported journal version {version} at offset {offset}"
            )));
        }

        let len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let body_len = FRAME_HEADER_SIZE + len;
        let frame_len = body_len + FRAME_TRAILER_SIZE;
        if rest.len() < frame_len {
            // A damaged length can point past the end; only a frame with
            // nothing intact after it is a torn tail.
            if let Some(next) = find_intact_frame(bytes, offset + 1) {
                return Err(StorageError::corrupted(format!(
                    "frame at offset {offset} declares {len} bytes past the journal end, \
                     but an intact frame follows at offset {next}"
                )));
            }
            return Ok(torn(entries, offset));
        }

        let body = &rest[..body_len];
        let stored_crc = u32::from_le_bytes([
            rest[body_len],
            rest[body_len + 1],
            rest[body_len + 2],
            rest[body_len + 3],
        ]);
        let computed_crc = compute_crc32(body);
        if stored_crc != computed_crc {
            if rest.len() == frame_len {
                return Ok(torn(entries, offset));
            }
            return Err(StorageError::corrupted(format!(
                "checksum mismatch at offset {offset}: expected {stored_crc:08x}, got {computed_crc:08x}"
            )));
        }

        let entry: JournalEntry = ciborium::from_reader(&body[FRAME_HEADER_SIZE..])
            .map_err(|e| StorageError::codec(format!("frame at offset {offset}: {e}")))?;
        entries.push(entry);
        offset += frame_len;
    }

    Ok(Replay {
        entries,
        valid_len: offset as u64,
        torn_tail: false,
    })
}

/// Returns the offset of the first complete frame with a valid checksum at
/// or after `start`.
fn find_intact_frame(bytes: &[u8], start: usize) -> Option<usize> {
    let last = bytes.len().checked_sub(FRAME_HEADER_SIZE + FRAME_TRAILER_SIZE)?;
    (start..=last).find(|&at| {
        let rest = &bytes[at..];
        if rest[0..4] != FRAME_MAGIC || u16::from_le_bytes([rest[4], rest[5]]) != JOURNAL_VERSION {
            return false;
        }
        let len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
        let body_len = FRAME_HEADER_SIZE + len;
        if rest.len() < body_len + FRAME_TRAILER_SIZE {
            return false;
        }
        let stored = u32::from_le_bytes([
            rest[body_len],
            rest[body_len + 1],
            rest[body_len + 2],
            rest[body_len + 3],
        ]);
        stored == compute_crc32(&rest[..body_len])
    })
}

fn torn(entries: Vec<JournalEntry>, offset: usize) -> Replay {
    Replay {
        entries,
        valid_len: offset as u64,
        torn_tail: true,
    }
}

/// Computes a CRC32 checksum (IEEE polynomial).
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}
