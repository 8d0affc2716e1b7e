//! Core type definitions for offstore.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a record within one store.
///
/// Keys are allocated by the store's key generator. They are unique within
/// their store and meaningless in any other store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(u64);

impl Key {
    /// Wraps a key produced by the backend.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw key value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key:{}", self.0)
    }
}

/// Point in time after which a stored presentation should not be played,
/// in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expiration(u64);

impl Expiration {
    /// An expiration that never passes.
    pub const NEVER: Self = Self(u64::MAX);

    /// Creates an expiration from milliseconds since the epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns milliseconds since the epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Returns true if this is [`Expiration::NEVER`].
    #[must_use]
    pub const fn is_never(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns true if the expiration is at or before `now_millis`.
    #[must_use]
    pub const fn has_passed(self, now_millis: u64) -> bool {
        !self.is_never() && self.0 <= now_millis
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Self::NEVER
    }
}

impl fmt::Display for Expiration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            f.write_str("never")
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

/// Converts keys to the backend's raw representation.
pub(crate) fn raw_keys(keys: &[Key]) -> Vec<u64> {
    keys.iter().map(|key| key.as_u64()).collect()
}

/// Pairs every lookup with its key, failing on the first missing record.
///
/// `found` must hold one entry per key, in the same order.
pub(crate) fn ensure_all_present<T>(
    store: &str,
    keys: &[Key],
    found: Vec<Option<T>>,
) -> CoreResult<Vec<(Key, T)>> {
    keys.iter()
        .copied()
        .zip(found)
        .map(|(key, value)| {
            value
                .map(|value| (key, value))
                .ok_or_else(|| CoreError::key_not_found(store, key))
        })
        .collect()
}
