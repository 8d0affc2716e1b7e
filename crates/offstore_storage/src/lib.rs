//! # offstore Storage
//!
//! Transactional object-store backend for offstore.
//!
//! A database is a set of named **object stores**, each a map from `u64` keys
//! to opaque byte values with its own auto-increment key generator. Committed
//! transactions are appended to a checksummed **journal** kept on a
//! [`JournalBackend`]; opening a database replays the journal.
//!
//! ## Design Principles
//!
//! - Values are opaque bytes; record formats belong to callers
//! - One frame per committed transaction, so commits are all-or-nothing
//! - A single writer at a time; readers never see staged writes
//! - Connections are shared behind `Arc` and closed by their opener
//!
//! ## Available Pieces
//!
//! - [`InMemoryBackend`] / [`FileBackend`] - journal byte stores
//! - [`Connection`] - open database with [`ReadTransaction`] and [`WriteTransaction`]
//! - [`MemoryProvider`] / [`DirectoryProvider`] - open and delete named databases
//!
//! ## Example
//!
//! ```rust
//! use offstore_storage::{ConnectionProvider, MemoryProvider, StoreOptions};
//!
//! # tokio_test_block(async {
//! let provider = MemoryProvider::new();
//! let conn = provider
//!     .open("media", 1, &mut |schema| {
//!         schema.create_store("segments", StoreOptions::auto_increment())
//!     })
//!     .unwrap();
//!
//! let mut txn = conn.begin_write(&["segments"]).await.unwrap();
//! let key = txn.add("segments", vec![0, 1, 2]).unwrap();
//! txn.commit().unwrap();
//!
//! let read = conn.begin_read(&["segments"]).unwrap();
//! assert_eq!(read.get("segments", key).unwrap(), Some(vec![0, 1, 2]));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod connection;
mod error;
mod file;
pub mod journal;
mod memory;
mod provider;
pub mod raw_bytes;
mod schema;

pub use backend::JournalBackend;
pub use connection::{Connection, ReadTransaction, UpgradeFn, WriteTransaction};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use provider::{ConnectionProvider, DirectoryProvider, MemoryProvider, JOURNAL_EXTENSION};
pub use schema::{SchemaUpgrade, StoreOptions, FIRST_GENERATED_KEY};
