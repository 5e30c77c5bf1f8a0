//! Sync engine.
//!
//! One pass runs in a fixed order:
//!
//! ```text
//! fetch changes ──► reconcile / delete ──► upload pending ──► commit cursor
//!      ▲                    │
//!      └── backoff ◄── cursor expired
//! ```

use crate::apply::{Reconciliation, RecordApplier};
use crate::config::SyncConfig;
use crate::cursor::CursorStore;
use crate::error::{SyncError, SyncResult};
use crate::observer::{NoopObserver, SyncObserver};
use crate::persistence::KeyValueStore;
use crate::remote::RemoteService;
use crate::state::{SyncReport, SyncState, SyncStats, UploadFailure};
use crate::store::LocalStore;
use chrono::{Duration as ChronoDuration, Utc};
use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use recordsync_model::{
    validate_fields, ChangeBatch, ChangeEvent, Cursor, LocalKey, LocalObject, RecordName,
    SyncMetadata, Syncable,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of draining the change feed.
enum Feed {
    /// Feed drained; holds the last cursor the service returned.
    Drained(Option<Cursor>),
    /// The service rejected the cursor.
    Expired,
}

/// Kind of upload performed for a pending object.
enum Upload {
    Created,
    Modified,
    /// Another task is already creating the record.
    Skipped,
}

/// Marks a pass as active for its lifetime.
struct ActivePass<'a> {
    state: &'a RwLock<SyncState>,
    finished: bool,
}

impl ActivePass<'_> {
    fn finish(mut self, state: SyncState) {
        *self.state.write() = state;
        self.finished = true;
    }
}

impl Drop for ActivePass<'_> {
    fn drop(&mut self) {
        // Reached only if the pass future was dropped mid-flight.
        if !self.finished {
            *self.state.write() = SyncState::Error;
        }
    }
}

/// Holds the exclusive right to create the remote record of one object.
struct CreateClaim<'a> {
    creating: &'a Mutex<HashSet<LocalKey>>,
    key: LocalKey,
}

impl Drop for CreateClaim<'_> {
    fn drop(&mut self) {
        self.creating.lock().remove(&self.key);
    }
}

/// Synchronizes one syncable type between a local store and a remote
/// record service.
///
/// Each engine owns its own state (syncing flag, cursor key, statistics);
/// engines for different types never share it.
///
/// # Example
///
/// ```rust,ignore
/// let engine = SyncEngine::new(
///     SyncConfig::for_type::<Note>(),
///     MemoryLocalStore::new(),
///     cloud,
///     Arc::new(FileKeyValueStore::open("state.cbor")?),
/// )?
/// .with_observer(observer);
///
/// let report = engine.sync().await?;
/// ```
pub struct SyncEngine<T, L, R> {
    pub(crate) config: SyncConfig,
    pub(crate) store: Arc<L>,
    pub(crate) remote: Arc<R>,
    pub(crate) defaults: Arc<dyn KeyValueStore>,
    pub(crate) applier: RecordApplier<T, L>,
    cursors: CursorStore,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    creating: Mutex<HashSet<LocalKey>>,
}

impl<T, L, R> SyncEngine<T, L, R>
where
    T: Syncable,
    L: LocalStore<T>,
    R: RemoteService,
{
    /// Creates a new sync engine.
    ///
    /// # Errors
    ///
    /// Fails if `T` declares an invalid field list.
    pub fn new(
        config: SyncConfig,
        store: impl Into<Arc<L>>,
        remote: impl Into<Arc<R>>,
        defaults: Arc<dyn KeyValueStore>,
    ) -> SyncResult<Self> {
        validate_fields::<T>()?;

        let store = store.into();
        let cursors = CursorStore::new(Arc::clone(&defaults), config.cursor_key());
        Ok(Self {
            applier: RecordApplier::new(Arc::clone(&store), Arc::new(NoopObserver)),
            config,
            store,
            remote: remote.into(),
            defaults,
            cursors,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            creating: Mutex::new(HashSet::new()),
        })
    }

    /// Installs an observer for external inserts, updates and deletions.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver<T>>) -> Self {
        self.applier = RecordApplier::new(Arc::clone(&self.store), observer);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<L> {
        &self.store
    }

    /// Returns the remote service.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns true while a pass is in progress.
    ///
    /// Callers should not start a second pass while this is true; the
    /// engine rejects overlapping passes instead of queuing them.
    pub fn is_syncing(&self) -> bool {
        self.state().is_active()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the persisted change cursor.
    pub fn cursor(&self) -> SyncResult<Option<Cursor>> {
        self.cursors.load()
    }

    /// Discards the persisted cursor so the next pass fetches everything.
    pub fn reset_cursor(&self) -> SyncResult<()> {
        self.cursors.clear()
    }

    /// Prepares server-side resources for this record type.
    pub async fn prepare_remote(&self) -> SyncResult<()> {
        self.remote.prepare().await?;
        info!(record_type = T::RECORD_TYPE, "remote prepared");
        Ok(())
    }

    /// Sets the state.
    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    fn begin_pass(&self) -> SyncResult<ActivePass<'_>> {
        let mut state = self.state.write();
        if !state.can_start_sync() {
            return Err(SyncError::AlreadySyncing);
        }
        *state = SyncState::Fetching;
        Ok(ActivePass {
            state: &self.state,
            finished: false,
        })
    }

    /// Performs a full sync pass.
    ///
    /// Remote changes are applied first, then pending local objects are
    /// uploaded, then the new cursor is committed. Only change-feed and
    /// local-store failures fail the pass; individual upload failures are
    /// listed in the report and retried on the next pass.
    pub async fn sync(&self) -> SyncResult<SyncReport> {
        let start = Instant::now();
        let pass = self.begin_pass()?;
        info!(namespace = %self.config.namespace, "sync pass started");

        let mut report = SyncReport::default();
        let outcome = self.run_pass(&mut report).await;
        report.duration = start.elapsed();

        match outcome {
            Ok(()) => {
                pass.finish(SyncState::Synced);
                self.record_success(&report);
                info!(
                    inserted = report.inserted,
                    updated = report.updated,
                    deleted = report.deleted,
                    uploaded = report.uploaded(),
                    upload_failures = report.upload_failures.len(),
                    cursor_resets = report.cursor_resets,
                    "sync pass completed"
                );
                Ok(report)
            }
            Err(error) => {
                pass.finish(SyncState::Error);
                self.record_failure(&error);
                warn!(%error, "sync pass failed");
                Err(error)
            }
        }
    }

    async fn run_pass(&self, report: &mut SyncReport) -> SyncResult<()> {
        let mut cursor = self.cursors.load()?;

        let latest = loop {
            self.set_state(SyncState::Fetching);
            match self.drain_feed(cursor.take(), report).await? {
                Feed::Drained(latest) => break latest,
                Feed::Expired => {
                    self.cursors.clear()?;
                    report.cursor_resets += 1;
                    self.set_state(SyncState::RetryWait);
                    warn!(
                        backoff_ms = self.config.cursor_reset_backoff.as_millis() as u64,
                        resets = report.cursor_resets,
                        "change cursor expired, resyncing from scratch"
                    );
                    tokio::time::sleep(self.config.cursor_reset_backoff).await;
                }
            }
        };

        self.set_state(SyncState::Uploading);
        self.upload_pending(report).await?;

        if let Some(cursor) = latest {
            self.cursors.save(&cursor)?;
            report.cursor_committed = true;
        }
        Ok(())
    }

    async fn drain_feed(&self, start: Option<Cursor>, report: &mut SyncReport) -> SyncResult<Feed> {
        let mut position = start;
        let mut latest = None;
        let mut pages = 0u32;

        loop {
            let batch = match self.remote.fetch_changes(position.as_ref()).await {
                Ok(batch) => batch,
                Err(SyncError::CursorExpired) => return Ok(Feed::Expired),
                Err(error) => return Err(error),
            };
            pages += 1;
            report.pages += 1;
            debug!(
                page = pages,
                changed = batch.changed_count(),
                deleted = batch.deleted_count(),
                more_coming = batch.more_coming,
                "fetched change page"
            );

            let ChangeBatch {
                events,
                new_cursor,
                more_coming,
                cursor_expired,
            } = batch;

            self.apply_events(events, report)?;
            if cursor_expired {
                return Ok(Feed::Expired);
            }

            match new_cursor {
                Some(cursor) => {
                    position = Some(cursor.clone());
                    latest = Some(cursor);
                }
                None if more_coming => {
                    return Err(SyncError::transport_fatal(
                        "change feed reported more pages without a cursor",
                    ));
                }
                None => {}
            }

            if !more_coming {
                break;
            }
            if self
                .config
                .max_pages_per_pass
                .is_some_and(|max| pages >= max)
            {
                report.more_coming = true;
                break;
            }
        }

        Ok(Feed::Drained(latest))
    }

    fn apply_events(&self, events: Vec<ChangeEvent>, report: &mut SyncReport) -> SyncResult<()> {
        for event in events {
            match event {
                ChangeEvent::Changed(record) => match self.applier.reconcile(&record) {
                    Ok(Reconciliation::Inserted) => report.inserted += 1,
                    Ok(Reconciliation::ServerWins) => report.updated += 1,
                    Ok(Reconciliation::LocalWins) => report.kept_local += 1,
                    Err(SyncError::Property(error)) => {
                        warn!(record = %record.name, %error, "skipping undecodable record");
                        report.rejected.push(record.name);
                    }
                    Err(error) => return Err(error),
                },
                ChangeEvent::Deleted(name) => {
                    if self.applier.delete(&name)? {
                        report.deleted += 1;
                    }
                }
            }
        }
        Ok(())
    }

    async fn upload_pending(&self, report: &mut SyncReport) -> SyncResult<()> {
        let pending = self.store.unsynced()?;
        if pending.is_empty() {
            return Ok(());
        }
        debug!(count = pending.len(), "uploading pending objects");

        let uploads = pending.into_iter().map(|object| async move {
            let key = object.key;
            (key, self.upload(&object).await)
        });

        for (key, result) in join_all(uploads).await {
            match result {
                Ok(Upload::Created) => report.created += 1,
                Ok(Upload::Modified) => report.modified += 1,
                Ok(Upload::Skipped) => {}
                Err(error) => {
                    warn!(%key, %error, "upload failed");
                    report.upload_failures.push(UploadFailure { key, error });
                }
            }
        }
        Ok(())
    }

    async fn upload(&self, object: &LocalObject<T>) -> SyncResult<Upload> {
        match object.record_name() {
            None => match self.create_remote(object).await? {
                Some(_) => Ok(Upload::Created),
                None => Ok(Upload::Skipped),
            },
            Some(name) => {
                self.modify_remote(object, name.clone()).await?;
                Ok(Upload::Modified)
            }
        }
    }

    fn claim_create(&self, key: LocalKey) -> Option<CreateClaim<'_>> {
        if !self.creating.lock().insert(key) {
            return None;
        }
        Some(CreateClaim {
            creating: &self.creating,
            key,
        })
    }

    /// Creates the remote record for a never-uploaded object.
    ///
    /// Returns `None` without contacting the service if another task is
    /// creating the record or has already created it.
    async fn create_remote(&self, object: &LocalObject<T>) -> SyncResult<Option<RecordName>> {
        let Some(_claim) = self.claim_create(object.key) else {
            debug!(key = %object.key, "create already in flight");
            return Ok(None);
        };
        if let Some(current) = self.store.get(&object.key)? {
            if current.record_name().is_some() {
                return Ok(None);
            }
        }

        let name = self.remote.create_record(object.properties()).await?;
        debug!(key = %object.key, record = %name, "created remote record");

        if !self.settle(object, name.clone())? {
            // Deleted locally, or already bound to another record.
            if let Err(error) = self.remote.delete_record(&name).await {
                warn!(record = %name, %error, "failed to remove orphaned record");
            }
        }
        Ok(Some(name))
    }

    /// Pushes local properties onto the existing remote record.
    async fn modify_remote(&self, object: &LocalObject<T>, name: RecordName) -> SyncResult<()> {
        let mut record = match self.remote.fetch_record(&name).await {
            Ok(record) => record,
            Err(SyncError::RecordNotFound(missing)) => {
                self.detach(&object.key)?;
                return Err(SyncError::RecordNotFound(missing));
            }
            Err(error) => return Err(error),
        };

        record.merge_properties(object.properties());
        let saved = self.remote.modify_record(record).await?;
        debug!(key = %object.key, record = %saved.name, "modified remote record");

        self.settle(object, saved.name)?;
        Ok(())
    }

    /// Records a successful upload of `uploaded` under `name`.
    ///
    /// The object stays pending if it was edited while the upload was in
    /// flight. Returns false if it no longer exists locally or already maps
    /// to a different record; the object is then left untouched.
    fn settle(&self, uploaded: &LocalObject<T>, name: RecordName) -> SyncResult<bool> {
        let Some(mut current) = self.store.get(&uploaded.key)? else {
            return Ok(false);
        };
        if current.record_name().is_some_and(|existing| *existing != name) {
            return Ok(false);
        }
        let edited = current.meta.modified_at != uploaded.meta.modified_at;
        current.mark_uploaded(name);
        if edited {
            current.mark_pending();
        }
        self.store.save(&current)?;
        Ok(true)
    }

    /// Forgets the remote identity of an object whose record disappeared,
    /// so the next pass creates a fresh record.
    fn detach(&self, key: &LocalKey) -> SyncResult<()> {
        if let Some(mut current) = self.store.get(key)? {
            warn!(%key, "remote record is gone, object will be re-created");
            current.detach();
            self.store.save(&current)?;
        }
        Ok(())
    }

    /// Inserts `value` locally and immediately uploads it.
    ///
    /// If the upload fails the error is returned, but the object stays in
    /// the local store as pending and is uploaded by the next pass.
    pub async fn create_object(&self, value: T) -> SyncResult<LocalObject<T>> {
        let object = self
            .store
            .insert(value, SyncMetadata::pending(Utc::now()))?;
        self.create_remote(&object).await?;
        Ok(self.store.get(&object.key)?.unwrap_or(object))
    }

    /// Applies `edit` to a local object, marks it pending and pushes it.
    ///
    /// Objects that were never uploaded stay pending and return
    /// `SyncError::NotYetSynced`; the next pass creates their record.
    pub async fn update_object<F>(&self, key: &LocalKey, edit: F) -> SyncResult<LocalObject<T>>
    where
        F: FnOnce(&mut T) + Send,
    {
        let mut object = self
            .store
            .get(key)?
            .ok_or(SyncError::LocalNotFound(*key))?;

        edit(&mut object.value);
        // Never stamp an edit at or before the version it was made on.
        let floor = object.meta.modified_at + ChronoDuration::milliseconds(1);
        object.touch(Utc::now().max(floor));
        self.store.save(&object)?;

        let name = object
            .record_name()
            .cloned()
            .ok_or(SyncError::NotYetSynced(*key))?;
        self.modify_remote(&object, name).await?;
        Ok(self.store.get(key)?.unwrap_or(object))
    }

    /// Deletes a local object and its remote record, if it has one.
    pub async fn delete_object(&self, key: &LocalKey) -> SyncResult<()> {
        let object = self
            .store
            .get(key)?
            .ok_or(SyncError::LocalNotFound(*key))?;
        self.store.delete(key)?;

        if let Some(name) = object.record_name() {
            self.remote.delete_record(name).await?;
            debug!(%key, record = %name, "deleted remote record");
        }
        Ok(())
    }

    fn record_success(&self, report: &SyncReport) {
        let mut stats = self.stats.write();
        stats.passes_completed += 1;
        stats.records_applied += report.applied();
        stats.records_deleted += report.deleted;
        stats.objects_uploaded += report.uploaded();
        stats.upload_failures += report.upload_failures.len() as u64;
        stats.cursor_resets += u64::from(report.cursor_resets);
        stats.last_sync_time = Some(Instant::now());
        stats.last_error = None;
    }

    fn record_failure(&self, error: &SyncError) {
        let mut stats = self.stats.write();
        stats.passes_failed += 1;
        stats.last_error = Some(error.to_string());
    }
}
