//! # offstore Core
//!
//! Durable storage for offline media content.
//!
//! This crate provides:
//! - [`SegmentRecord`] and [`ManifestRecord`], the two record kinds
//! - [`StorageCell`], which adds, reads, removes and updates them with
//!   per-batch atomicity over a shared [`Connection`]
//! - [`open_database`] and [`StorageMechanism`] to create the stores and own
//!   the connection
//! - [`CoreError`] with severity, category and numeric code
//!
//! The transactional backend lives in [`offstore_storage`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cell;
mod codec;
mod config;
mod error;
mod mechanism;
mod record;
mod schema;
mod types;

pub use cell::StorageCell;
pub use codec::RecordCodec;
pub use config::{
    CellConfig, DatabaseConfig, CURRENT_SCHEMA_VERSION, DEFAULT_DATABASE_NAME,
    DEFAULT_MANIFEST_STORE, DEFAULT_SEGMENT_STORE,
};
pub use error::{Category, CoreError, CoreResult, ErrorCode, Severity};
pub use mechanism::StorageMechanism;
pub use record::{
    ByteRange, ContentType, ManifestRecord, SegmentRecord, SegmentReference, StreamRecord,
};
pub use schema::open_database;
pub use types::{Expiration, Key};

pub use offstore_storage::{Connection, ConnectionProvider, DirectoryProvider, MemoryProvider};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
