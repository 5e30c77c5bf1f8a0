//! Applying remote records to the local store.
//!
//! The same applier serves full sync passes and single push notifications,
//! so both paths share insert, overwrite and delete semantics.

use crate::error::SyncResult;
use crate::observer::SyncObserver;
use crate::store::LocalStore;
use recordsync_model::{LocalObject, RecordName, RemoteRecord, SyncMetadata, Syncable};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Outcome of reconciling one remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// No local mirror existed; one was inserted.
    Inserted,
    /// The server copy was newer and overwrote the local object.
    ServerWins,
    /// The local copy was newer or equally new; it is queued for upload.
    LocalWins,
}

/// Applies remote records to a local store and reports external changes.
pub struct RecordApplier<T, L> {
    store: Arc<L>,
    observer: Arc<dyn SyncObserver<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Syncable, L: LocalStore<T>> RecordApplier<T, L> {
    /// Creates an applier.
    pub fn new(store: Arc<L>, observer: Arc<dyn SyncObserver<T>>) -> Self {
        Self {
            store,
            observer,
            _marker: PhantomData,
        }
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<L> {
        &self.store
    }

    /// Applies the last-write-wins rule to `record`.
    ///
    /// Ties favor the local copy: an object whose modification time equals
    /// the record's is marked pending and re-uploaded.
    pub fn reconcile(&self, record: &RemoteRecord) -> SyncResult<Reconciliation> {
        let Some(mut object) = self.store.find_by_record_name(&record.name)? else {
            self.insert(record)?;
            return Ok(Reconciliation::Inserted);
        };

        if object.meta.modified_at < record.modified_at {
            object.adopt(record)?;
            self.store.save(&object)?;
            debug!(record = %record.name, key = %object.key, "server copy wins");
            self.observer.on_external_update(&object);
            Ok(Reconciliation::ServerWins)
        } else {
            if object.meta.synced {
                object.mark_pending();
                self.store.save(&object)?;
            }
            debug!(record = %record.name, key = %object.key, "local copy wins");
            Ok(Reconciliation::LocalWins)
        }
    }

    /// Materializes `record` as a new local object.
    pub fn insert(&self, record: &RemoteRecord) -> SyncResult<LocalObject<T>> {
        let value = T::from_properties(&record.properties)?;
        let object = self.store.insert(value, SyncMetadata::from_record(record))?;
        debug!(record = %record.name, key = %object.key, "inserted from remote");
        self.observer.on_external_insert(&object);
        Ok(object)
    }

    /// Overwrites the local mirror of `record` without comparing times.
    ///
    /// Returns `None` if there is no local mirror.
    pub fn overwrite(&self, record: &RemoteRecord) -> SyncResult<Option<LocalObject<T>>> {
        let Some(mut object) = self.store.find_by_record_name(&record.name)? else {
            return Ok(None);
        };
        object.adopt(record)?;
        self.store.save(&object)?;
        self.observer.on_external_update(&object);
        Ok(Some(object))
    }

    /// Deletes the local mirror of `name`, if any.
    ///
    /// Returns true and notifies the observer only if an object was deleted.
    pub fn delete(&self, name: &RecordName) -> SyncResult<bool> {
        let Some(object) = self.store.find_by_record_name(name)? else {
            return Ok(false);
        };
        if !self.store.delete(&object.key)? {
            return Ok(false);
        }
        debug!(record = %name, key = %object.key, "deleted from remote");
        self.observer.on_external_delete(name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Event, Note, RecordingObserver};
    use crate::store::MemoryLocalStore;
    use chrono::{DateTime, Duration, Utc};
    use recordsync_model::PropertyValue;

    fn record(name: &str, title: &str, at: DateTime<Utc>) -> RemoteRecord {
        RemoteRecord::new(name, at, Note::new(title, 5).to_properties())
    }

    fn setup() -> (
        RecordApplier<Note, MemoryLocalStore<Note>>,
        Arc<MemoryLocalStore<Note>>,
        Arc<RecordingObserver>,
    ) {
        let store = Arc::new(MemoryLocalStore::new());
        let observer = Arc::new(RecordingObserver::default());
        let applier = RecordApplier::<Note, _>::new(Arc::clone(&store), observer.clone());
        (applier, store, observer)
    }

    fn seed(store: &MemoryLocalStore<Note>, name: &str, at: DateTime<Utc>) -> LocalObject<Note> {
        store
            .insert(
                Note::new("local", 1),
                SyncMetadata {
                    record_name: Some(name.into()),
                    modified_at: at,
                    synced: true,
                },
            )
            .unwrap()
    }

    #[test]
    fn missing_local_object_is_inserted() {
        let (applier, store, observer) = setup();
        let t1 = Utc::now();

        let outcome = applier.reconcile(&record("X", "remote", t1)).unwrap();
        assert_eq!(outcome, Reconciliation::Inserted);

        let object = store.find_by_record_name(&"X".into()).unwrap().unwrap();
        assert_eq!(object.value, Note::new("remote", 5));
        assert!(object.meta.synced);
        assert_eq!(object.meta.modified_at, t1);
        assert_eq!(observer.events(), vec![Event::Inserted(Note::new("remote", 5))]);
    }

    #[test]
    fn newer_server_copy_overwrites() {
        let (applier, store, observer) = setup();
        let t0 = Utc::now();
        let t1 = t0 + Duration::seconds(10);
        let local = seed(&store, "X", t0);

        let outcome = applier.reconcile(&record("X", "remote", t1)).unwrap();
        assert_eq!(outcome, Reconciliation::ServerWins);

        let object = store.get(&local.key).unwrap().unwrap();
        assert_eq!(object.value.title, "remote");
        assert_eq!(object.meta.modified_at, t1);
        assert!(object.meta.synced);
        assert_eq!(observer.events(), vec![Event::Updated(Note::new("remote", 5))]);
    }

    #[test]
    fn newer_local_copy_is_queued_for_upload() {
        let (applier, store, observer) = setup();
        let t1 = Utc::now();
        let local = seed(&store, "X", t1 + Duration::seconds(10));

        let outcome = applier.reconcile(&record("X", "remote", t1)).unwrap();
        assert_eq!(outcome, Reconciliation::LocalWins);

        let object = store.get(&local.key).unwrap().unwrap();
        assert_eq!(object.value.title, "local");
        assert!(!object.meta.synced);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn tie_favors_local_copy() {
        let (applier, store, _) = setup();
        let t1 = Utc::now();
        let local = seed(&store, "X", t1);

        let outcome = applier.reconcile(&record("X", "remote", t1)).unwrap();
        assert_eq!(outcome, Reconciliation::LocalWins);
        assert!(!store.get(&local.key).unwrap().unwrap().meta.synced);
    }

    #[test]
    fn second_reconcile_changes_no_properties() {
        let (applier, store, observer) = setup();
        let t0 = Utc::now();
        let local = seed(&store, "X", t0);
        let remote = record("X", "remote", t0 + Duration::seconds(1));

        applier.reconcile(&remote).unwrap();
        let first = store.get(&local.key).unwrap().unwrap();

        // Equal timestamps now: properties stay, only the pending flag flips.
        assert_eq!(applier.reconcile(&remote).unwrap(), Reconciliation::LocalWins);
        let second = store.get(&local.key).unwrap().unwrap();
        assert_eq!(first.value, second.value);
        assert_eq!(first.meta.modified_at, second.meta.modified_at);
        assert_eq!(observer.events().len(), 1);
    }

    #[test]
    fn malformed_record_leaves_object_untouched() {
        let (applier, store, observer) = setup();
        let t0 = Utc::now();
        let local = seed(&store, "X", t0);

        let mut bad = record("X", "remote", t0 + Duration::seconds(1));
        bad.properties
            .insert("priority".into(), PropertyValue::from("high"));

        assert!(applier.reconcile(&bad).is_err());
        assert_eq!(store.get(&local.key).unwrap().unwrap(), local);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn delete_notifies_once() {
        let (applier, store, observer) = setup();
        seed(&store, "X", Utc::now());

        assert!(applier.delete(&"X".into()).unwrap());
        assert!(!applier.delete(&"X".into()).unwrap());
        assert!(store.is_empty());
        assert_eq!(observer.events(), vec![Event::Deleted("X".into())]);
    }

    #[test]
    fn overwrite_ignores_timestamps() {
        let (applier, store, _) = setup();
        let t0 = Utc::now();
        let local = seed(&store, "X", t0 + Duration::seconds(60));

        let updated = applier.overwrite(&record("X", "pushed", t0)).unwrap();
        assert!(updated.is_some());
        assert_eq!(store.get(&local.key).unwrap().unwrap().value.title, "pushed");

        assert!(applier.overwrite(&record("Y", "x", t0)).unwrap().is_none());
    }
}
