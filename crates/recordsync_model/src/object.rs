//! Local side of a sync pair.

use crate::error::PropertyResult;
use crate::record::{RecordName, RemoteRecord};
use crate::syncable::Syncable;
use crate::value::PropertyMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Local identity of an object, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalKey(Uuid);

impl LocalKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LocalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sync bookkeeping attached to every local object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Remote identity; `None` until the first successful upload.
    pub record_name: Option<RecordName>,
    /// Time of the last local mutation (or adopted server time).
    pub modified_at: DateTime<Utc>,
    /// True when the local state matches the last uploaded state.
    pub synced: bool,
}

impl SyncMetadata {
    /// Metadata for an object created locally and not yet uploaded.
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            record_name: None,
            modified_at: now,
            synced: false,
        }
    }

    /// Metadata for an object materialized from a remote record.
    pub fn from_record(record: &RemoteRecord) -> Self {
        Self {
            record_name: Some(record.name.clone()),
            modified_at: record.modified_at,
            synced: true,
        }
    }
}

/// A syncable value together with its key and sync metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalObject<T> {
    /// Local identity.
    pub key: LocalKey,
    /// Sync bookkeeping.
    pub meta: SyncMetadata,
    /// Application data.
    pub value: T,
}

impl<T: Syncable> LocalObject<T> {
    /// Returns the remote identity, if uploaded.
    pub fn record_name(&self) -> Option<&RecordName> {
        self.meta.record_name.as_ref()
    }

    /// Returns true if the object has no pending local changes.
    pub fn is_synced(&self) -> bool {
        self.meta.synced
    }

    /// Properties restricted to the type's declared fields.
    pub fn properties(&self) -> PropertyMap {
        self.value.to_properties()
    }

    /// Records a local edit: stamps `now` and marks the object pending.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.meta.modified_at = now;
        self.meta.synced = false;
    }

    /// Marks the object as uploaded under `name`.
    pub fn mark_uploaded(&mut self, name: RecordName) {
        self.meta.record_name = Some(name);
        self.meta.synced = true;
    }

    /// Marks the object as needing upload.
    pub fn mark_pending(&mut self) {
        self.meta.synced = false;
    }

    /// Forgets the remote identity so the next upload creates a new record.
    pub fn detach(&mut self) {
        self.meta.record_name = None;
        self.meta.synced = false;
    }

    /// Overwrites properties and modification time from `record`.
    ///
    /// On success the object is marked synced. On a property type mismatch
    /// the object is left unchanged.
    pub fn adopt(&mut self, record: &RemoteRecord) -> PropertyResult<()> {
        self.value.apply_properties(&record.properties)?;
        self.meta.modified_at = record.modified_at;
        self.meta.synced = true;
        Ok(())
    }
}
