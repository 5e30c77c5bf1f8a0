//! # RecordSync Engine
//!
//! Bidirectional synchronization between a local object store and a remote
//! record service.
//!
//! This crate provides:
//! - Sync engine with a pass state machine (idle → fetching → uploading → synced)
//! - Change cursor persistence and recovery from cursor expiry
//! - Last-write-wins conflict resolution
//! - Push notification handling
//! - Local store and remote service abstractions, with in-memory and mock
//!   implementations
//!
//! ## Architecture
//!
//! Every pass is **fetch-then-upload**:
//! 1. Drain the remote change feed from the persisted cursor
//! 2. Reconcile each changed record and apply each deletion locally
//! 3. Upload every pending local object
//! 4. Commit the new cursor
//!
//! ## Key Invariants
//!
//! - Remote changes are applied before local changes are uploaded
//! - The cursor is committed once per pass, after uploads
//! - A local object maps to at most one remote record
//! - Objects never uploaded are only ever created, never fetched or modified
//! - Ties in last-write-wins favor the local copy

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod apply;
mod config;
mod cursor;
mod engine;
mod error;
mod notification;
mod observer;
mod persistence;
mod remote;
mod state;
mod store;

#[cfg(test)]
mod fixtures;

pub use apply::{Reconciliation, RecordApplier};
pub use config::{SyncConfig, DEFAULT_CURSOR_RESET_BACKOFF};
pub use cursor::CursorStore;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use notification::NotificationOutcome;
pub use observer::{NoopObserver, SyncObserver};
pub use persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use remote::{MockRemoteService, RemoteCall, RemoteOp, RemoteService};
pub use state::{SyncReport, SyncState, SyncStats, UploadFailure};
pub use store::{LocalStore, MemoryLocalStore};
