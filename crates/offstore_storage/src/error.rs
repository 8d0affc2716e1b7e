//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage backend and its connections.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal is corrupted.
    #[error("journal corrupted: {0}")]
    Corrupted(String),

    /// The connection is closed.
    #[error("connection is closed")]
    Closed,

    /// A store name does not exist in the connection's schema.
    #[error("object store not found: {name}")]
    StoreNotFound {
        /// Name of the missing store.
        name: String,
    },

    /// A store with the same name already exists.
    #[error("object store already exists: {name}")]
    StoreExists {
        /// Name of the duplicate store.
        name: String,
    },

    /// The store exists but was not part of the transaction's scope.
    #[error("object store {name} is not in the transaction scope")]
    StoreNotInScope {
        /// Name of the store.
        name: String,
    },

    /// The requested schema version is older than the stored one.
    #[error("version mismatch: requested {requested}, stored {stored}")]
    VersionMismatch {
        /// Version passed to `open`.
        requested: u64,
        /// Version found in the journal.
        stored: u64,
    },

    /// The transaction already committed or aborted.
    #[error("transaction already finished")]
    TransactionFinished,

    /// Encoding or decoding of a journal entry failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Another process has the database open.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database name cannot be mapped to a backend location.
    #[error("invalid database name: {0:?}")]
    InvalidName(String),

    /// A store without a key generator was asked to allocate a key, or the
    /// generator ran out of keys.
    #[error("key generator unavailable for store {name}")]
    KeyGeneratorExhausted {
        /// Name of the store.
        name: String,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /// Creates a store-not-found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }
}
