//! Remote record, change cursor and change feed types.

use crate::value::{PropertyMap, PropertyValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote identity of a record.
///
/// Assigned by the remote service on creation, never by the client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordName(String);

impl RecordName {
    /// Creates a record name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RecordName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A record as stored by the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Record identity.
    pub name: RecordName,
    /// Server-authoritative modification time.
    pub modified_at: DateTime<Utc>,
    /// Properties, keyed like the syncable's fields.
    pub properties: PropertyMap,
}

impl RemoteRecord {
    /// Creates a record.
    pub fn new(
        name: impl Into<RecordName>,
        modified_at: DateTime<Utc>,
        properties: PropertyMap,
    ) -> Self {
        Self {
            name: name.into(),
            modified_at,
            properties,
        }
    }

    /// Overwrites properties by name with `properties`.
    ///
    /// Properties not present in `properties` are kept.
    pub fn merge_properties(&mut self, properties: PropertyMap) {
        self.properties.extend(properties);
    }

    /// Returns a single property.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

/// Opaque server-issued change cursor.
///
/// The client never inspects the contents; it only hands the bytes back to
/// the change feed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Vec<u8>);

impl Cursor {
    /// Wraps raw cursor bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the cursor, returning the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cursor({} bytes)", self.0.len())
    }
}

/// One entry of the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChangeEvent {
    /// A record was created or modified.
    Changed(RemoteRecord),
    /// A record was deleted.
    Deleted(RecordName),
}

/// A page of the remote change feed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeBatch {
    /// Events in the order the service delivered them.
    pub events: Vec<ChangeEvent>,
    /// Cursor covering everything up to and including this page.
    pub new_cursor: Option<Cursor>,
    /// True if the service has more pages after this one.
    pub more_coming: bool,
    /// True if the cursor the client sent is no longer valid.
    pub cursor_expired: bool,
}

impl ChangeBatch {
    /// Creates a final page.
    pub fn new(events: Vec<ChangeEvent>, new_cursor: Option<Cursor>) -> Self {
        Self {
            events,
            new_cursor,
            more_coming: false,
            cursor_expired: false,
        }
    }

    /// Creates a page reporting that the cursor has expired.
    pub fn expired() -> Self {
        Self {
            cursor_expired: true,
            ..Self::default()
        }
    }

    /// Marks this page as having more pages after it.
    pub fn with_more_coming(mut self) -> Self {
        self.more_coming = true;
        self
    }

    /// Number of changed records in the page.
    pub fn changed_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ChangeEvent::Changed(_)))
            .count()
    }

    /// Number of deletions in the page.
    pub fn deleted_count(&self) -> usize {
        self.events.len() - self.changed_count()
    }
}
