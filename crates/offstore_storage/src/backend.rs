//! Journal backend trait definition.

use crate::error::StorageResult;

/// A byte store holding a connection's journal.
///
/// Journal backends are **opaque byte stores**. They know nothing about
/// frames, stores or records; the [`Connection`](crate::Connection) owns the
/// journal format and only asks the backend to keep bytes durable.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_all` returns every byte appended and not truncated
/// - `sync` makes all appended bytes survive process termination
/// - Backends must be `Send + Sync` so connections can be shared
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and ephemeral databases
/// - [`super::FileBackend`] - For persistent databases
pub trait JournalBackend: Send + Sync {
    /// Reads the whole journal.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Appends one encoded frame to the end of the journal.
    ///
    /// Returns the offset where the frame starts.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs. The journal may hold a
    /// partial frame afterwards; callers truncate back to the previous size.
    fn append(&mut self, frame: &[u8]) -> StorageResult<u64>;

    /// Pushes appended bytes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Flushes data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Truncates the journal to `new_size` bytes.
    ///
    /// Used to drop a torn tail frame during recovery and to undo a
    /// failed append.
    ///
    /// # Errors
    ///
    /// Returns an error if `new_size` is greater than the current size
    /// or the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
