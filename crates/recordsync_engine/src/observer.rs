//! Observers for changes that originate on the remote side.

use recordsync_model::{LocalObject, RecordName};

/// Receives notice of local changes made on behalf of the remote service.
///
/// Callbacks run inline on the engine's task and should return quickly.
/// Local edits are not reported when they are made. A record this device
/// uploaded can still come back through the change feed; if the server
/// stamped it later than the local copy it is reported as an update.
pub trait SyncObserver<T>: Send + Sync {
    /// A remote record was materialized as a new local object.
    fn on_external_insert(&self, _object: &LocalObject<T>) {}

    /// A local object was overwritten with remote data.
    fn on_external_update(&self, _object: &LocalObject<T>) {}

    /// The local mirror of `record_name` was deleted.
    fn on_external_delete(&self, _record_name: &RecordName) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<T> SyncObserver<T> for NoopObserver {}
