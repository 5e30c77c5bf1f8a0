//! Push notifications and account state.

use crate::record::RecordName;
use serde::{Deserialize, Serialize};

/// What happened to a record, as reported by a push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// Record was created.
    Created,
    /// Record was updated.
    Updated,
    /// Record was deleted.
    Deleted,
}

/// A single out-of-band record event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Event kind.
    pub kind: NotificationKind,
    /// Affected record.
    pub record_name: RecordName,
}

impl Notification {
    /// Creates a notification.
    pub fn new(kind: NotificationKind, record_name: impl Into<RecordName>) -> Self {
        Self {
            kind,
            record_name: record_name.into(),
        }
    }

    /// Creates a `Created` notification.
    pub fn created(record_name: impl Into<RecordName>) -> Self {
        Self::new(NotificationKind::Created, record_name)
    }

    /// Creates an `Updated` notification.
    pub fn updated(record_name: impl Into<RecordName>) -> Self {
        Self::new(NotificationKind::Updated, record_name)
    }

    /// Creates a `Deleted` notification.
    pub fn deleted(record_name: impl Into<RecordName>) -> Self {
        Self::new(NotificationKind::Deleted, record_name)
    }
}

/// Result of comparing the signed-in account against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    /// No account was stored before; this is the first sync.
    FirstSync,
    /// Same account as last time.
    AlreadySynced,
    /// A different account is signed in.
    Changed,
}
