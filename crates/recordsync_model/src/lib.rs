//! # recordsync Model
//!
//! Data contracts shared by the recordsync engine and its adapters.
//!
//! This crate provides:
//! - `Syncable` and `Field` for statically declared property transfer
//! - `PropertyValue` / `PropertyMap` for record payloads
//! - `LocalObject` and `SyncMetadata` for the local side of a sync pair
//! - `RemoteRecord`, `Cursor` and `ChangeBatch` for the remote side
//! - `Notification` for out-of-band push events
//!
//! This is a pure model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod notification;
mod object;
mod record;
mod syncable;
mod value;

pub use error::{PropertyError, PropertyResult};
pub use notification::{AccountState, Notification, NotificationKind};
pub use object::{LocalKey, LocalObject, SyncMetadata};
pub use record::{ChangeBatch, ChangeEvent, Cursor, RecordName, RemoteRecord};
pub use syncable::{validate_fields, Field, Syncable};
pub use value::{PropertyMap, PropertyValue};
