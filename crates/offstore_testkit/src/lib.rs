//! # offstore Testkit
//!
//! Test utilities for offstore.
//!
//! This crate provides:
//! - Sample segments and manifests ([`create_segment_data`], [`create_manifest`])
//! - Ready-to-use databases ([`TestStorage`])
//! - Journal fault injection ([`FaultyProvider`], [`FaultSwitch`])
//! - Property-based generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use offstore_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn stores_segments() {
//!     let storage = TestStorage::memory();
//!     let cell = storage.cell();
//!     let keys = cell.add_segments(&[create_segment_data(&[0, 1])]).await.unwrap();
//!     assert_eq!(keys.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
