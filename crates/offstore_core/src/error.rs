//! Error types for offstore core.
//!
//! Every error carries a [`Severity`], a [`Category`] and a numeric
//! [`ErrorCode`] so that callers can report failures uniformly.

use crate::types::Key;
use offstore_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// How bad an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// The operation failed but retrying later may succeed.
    Recoverable = 1,
    /// The operation cannot succeed without outside intervention.
    Critical = 2,
}

/// Which subsystem an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Offline storage.
    Storage = 9,
}

/// Stable numeric error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The backend failed (I/O, journal, closed connection, ...).
    StorageFailure = 9001,
    /// The cell was destroyed before the operation ran.
    OperationAborted = 9002,
    /// A configured store does not exist in the connection's schema.
    StoreNotFound = 9003,
    /// A stored value could not be decoded, or a record could not be encoded.
    MalformedRecord = 9004,
    /// The operation is not allowed on this cell.
    OperationNotSupported = 9011,
    /// A requested key has no record.
    KeyNotFound = 9012,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", *self as u16)
    }
}

/// Errors that can occur in storage cell operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend error.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),

    /// A requested key has no record in the store.
    #[error("{key} not found in store {store}")]
    KeyNotFound {
        /// Store that was searched.
        store: String,
        /// The first missing key.
        key: Key,
    },

    /// A write was issued on a read-only cell.
    #[error("{operation} is not supported on read-only store {store}")]
    OperationNotSupported {
        /// The rejected operation.
        operation: &'static str,
        /// Store the operation targeted.
        store: String,
    },

    /// A configured store name is missing from the schema.
    #[error("store not found: {name}")]
    StoreNotFound {
        /// Name of the store.
        name: String,
    },

    /// The cell was destroyed.
    #[error("storage cell has been destroyed")]
    Destroyed,

    /// A stored value does not decode as the expected record type.
    #[error("corrupt record {key} in store {store}: {message}")]
    CorruptRecord {
        /// Store holding the record.
        store: String,
        /// Key of the record.
        key: Key,
        /// Decoder message.
        message: String,
    },

    /// A record could not be encoded.
    #[error("record encoding failed: {message}")]
    Encode {
        /// Encoder message.
        message: String,
    },
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StoreNotFound { name } => Self::StoreNotFound { name },
            other => Self::Storage(other),
        }
    }
}

impl CoreError {
    /// Creates a key-not-found error.
    pub fn key_not_found(store: impl Into<String>, key: Key) -> Self {
        Self::KeyNotFound {
            store: store.into(),
            key,
        }
    }

    /// Creates an operation-not-supported error.
    pub fn not_supported(operation: &'static str, store: impl Into<String>) -> Self {
        Self::OperationNotSupported {
            operation,
            store: store.into(),
        }
    }

    /// Creates a corrupt-record error.
    pub fn corrupt_record(store: impl Into<String>, key: Key, message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            store: store.into(),
            key,
            message: message.into(),
        }
    }

    /// Returns the severity of the error.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Storage(StorageError::Io(_) | StorageError::DatabaseLocked) => {
                Severity::Recoverable
            }
            _ => Severity::Critical,
        }
    }

    /// Returns the category of the error.
    #[must_use]
    pub fn category(&self) -> Category {
        Category::Storage
    }

    /// Returns the numeric code of the error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Storage(_) => ErrorCode::StorageFailure,
            Self::KeyNotFound { .. } => ErrorCode::KeyNotFound,
            Self::OperationNotSupported { .. } => ErrorCode::OperationNotSupported,
            Self::StoreNotFound { .. } => ErrorCode::StoreNotFound,
            Self::Destroyed => ErrorCode::OperationAborted,
            Self::CorruptRecord { .. } | Self::Encode { .. } => ErrorCode::MalformedRecord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_is_lifted() {
        let err = CoreError::from(StorageError::store_not_found("manifest-store"));
        assert!(matches!(err, CoreError::StoreNotFound { ref name } if name == "manifest-store"));
        assert_eq!(err.code(), ErrorCode::StoreNotFound);
    }

    #[test]
    fn key_not_found_taxonomy() {
        let err = CoreError::key_not_found("segment-store", Key::from_raw(4));
        assert_eq!(err.severity(), Severity::Critical);
        assert_eq!(err.category(), Category::Storage);
        assert_eq!(err.code(), ErrorCode::KeyNotFound);
        assert_eq!(err.to_string(), "key:4 not found in store segment-store");
    }

    #[test]
    fn io_failures_are_recoverable() {
        let err = CoreError::from(StorageError::Io(std::io::Error::other("disk busy")));
        assert_eq!(err.severity(), Severity::Recoverable);
        assert_eq!(err.code(), ErrorCode::StorageFailure);
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::KeyNotFound.to_string(), "9012");
        assert_eq!(CoreError::Destroyed.code() as u16, 9002);
    }
}
