//! Out-of-band record notifications.
//!
//! A push notification names one record and what happened to it. The
//! engine applies it immediately, outside of a sync pass, and never touches
//! the change cursor; the next pass still sees the same change through the
//! feed and reconciles it as usual.

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteService;
use crate::store::LocalStore;
use recordsync_model::{Notification, NotificationKind, RecordName, RemoteRecord, Syncable};
use tracing::{debug, warn};

/// What handling a notification did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// A new local object was inserted.
    Inserted,
    /// An existing local object was overwritten.
    Updated,
    /// The local mirror was deleted.
    Deleted,
    /// Nothing changed locally.
    Ignored,
}

impl<T, L, R> SyncEngine<T, L, R>
where
    T: Syncable,
    L: LocalStore<T>,
    R: RemoteService,
{
    /// Applies a single push notification.
    ///
    /// Created and updated records are fetched from the service first. A
    /// record that cannot be fetched or decoded is ignored; only local store
    /// failures are returned as errors. Creations for records that already
    /// have a local mirror, and updates for records that have none, are
    /// ignored.
    pub async fn apply_notification(
        &self,
        notification: &Notification,
    ) -> SyncResult<NotificationOutcome> {
        let name = &notification.record_name;
        debug!(kind = ?notification.kind, record = %name, "handling notification");

        let outcome = match notification.kind {
            NotificationKind::Created => match self.fetch_for_notification(name).await {
                Some(record) => self.insert_notified(&record)?,
                None => NotificationOutcome::Ignored,
            },
            NotificationKind::Updated => match self.fetch_for_notification(name).await {
                Some(record) => self.overwrite_notified(&record)?,
                None => NotificationOutcome::Ignored,
            },
            NotificationKind::Deleted => {
                if self.applier.delete(name)? {
                    NotificationOutcome::Deleted
                } else {
                    NotificationOutcome::Ignored
                }
            }
        };
        Ok(outcome)
    }

    async fn fetch_for_notification(&self, name: &RecordName) -> Option<RemoteRecord> {
        match self.remote.fetch_record(name).await {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(record = %name, %error, "could not fetch notified record");
                None
            }
        }
    }

    fn insert_notified(&self, record: &RemoteRecord) -> SyncResult<NotificationOutcome> {
        // The feed may already have delivered this record.
        if self.store.find_by_record_name(&record.name)?.is_some() {
            return Ok(NotificationOutcome::Ignored);
        }
        match self.applier.insert(record) {
            Ok(_) => Ok(NotificationOutcome::Inserted),
            Err(error) => ignore_undecodable(record, error),
        }
    }

    fn overwrite_notified(&self, record: &RemoteRecord) -> SyncResult<NotificationOutcome> {
        match self.applier.overwrite(record) {
            Ok(Some(_)) => Ok(NotificationOutcome::Updated),
            Ok(None) => Ok(NotificationOutcome::Ignored),
            Err(error) => ignore_undecodable(record, error),
        }
    }
}

fn ignore_undecodable(record: &RemoteRecord, error: SyncError) -> SyncResult<NotificationOutcome> {
    match error {
        SyncError::Property(error) => {
            warn!(record = %record.name, %error, "ignoring undecodable notified record");
            Ok(NotificationOutcome::Ignored)
        }
        other => Err(other),
    }
}
