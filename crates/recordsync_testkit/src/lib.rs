//! # RecordSync Testkit
//!
//! Test utilities for RecordSync.
//!
//! This crate provides:
//! - `InMemoryCloud`, a stateful remote service with a change log, paging,
//!   cursor expiry and failure injection
//! - Test fixtures: a `Note` syncable, a recording observer, simulated devices
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recordsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn two_devices_converge() {
//!     let cloud = Arc::new(InMemoryCloud::new());
//!     let a = Device::new(Arc::clone(&cloud));
//!     let b = Device::new(Arc::clone(&cloud));
//!
//!     a.engine.create_object(Note::new("milk", 1)).await.unwrap();
//!     b.engine.sync().await.unwrap();
//!     assert_eq!(a.notes(), b.notes());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cloud;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cloud::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use cloud::*;
pub use fixtures::*;
pub use generators::*;
