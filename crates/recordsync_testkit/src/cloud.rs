//! Stateful in-memory remote service.
//!
//! `InMemoryCloud` behaves like a small record database shared by every
//! engine pointed at it:
//! - Records keyed by server-assigned names
//! - A change log in commit order, addressed by sequence numbers
//! - Cursors that expire once the log is compacted past them
//! - A monotonic server clock for `modified_at`

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use recordsync_engine::{RemoteOp, RemoteService, SyncError, SyncResult};
use recordsync_model::{ChangeBatch, ChangeEvent, Cursor, PropertyMap, RecordName, RemoteRecord};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// One entry of the change log.
#[derive(Debug, Clone)]
struct LogEntry {
    sequence: u64,
    name: RecordName,
    deleted: bool,
}

#[derive(Debug)]
struct CloudState {
    records: BTreeMap<RecordName, RemoteRecord>,
    log: Vec<LogEntry>,
    /// Highest sequence assigned so far.
    head: u64,
    /// Cursors strictly below this sequence are expired.
    horizon: u64,
    next_name: u64,
    clock: DateTime<Utc>,
    user: Option<String>,
    prepared: bool,
}

impl CloudState {
    fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            log: Vec::new(),
            head: 0,
            horizon: 0,
            next_name: 0,
            clock: Utc::now(),
            user: None,
            prepared: false,
        }
    }

    /// Returns a server time strictly later than every earlier one.
    fn tick(&mut self) -> DateTime<Utc> {
        let floor = self.clock + Duration::microseconds(1);
        self.clock = Utc::now().max(floor);
        self.clock
    }

    fn append(&mut self, name: RecordName, deleted: bool) {
        self.head += 1;
        self.log.push(LogEntry {
            sequence: self.head,
            name,
            deleted,
        });
    }

    fn create(&mut self, properties: PropertyMap) -> RecordName {
        self.next_name += 1;
        let name = RecordName::new(format!("rec-{:06}", self.next_name));
        let record = RemoteRecord::new(name.clone(), self.tick(), properties);
        self.records.insert(name.clone(), record);
        self.append(name.clone(), false);
        name
    }

    fn modify(&mut self, mut record: RemoteRecord) -> SyncResult<RemoteRecord> {
        if !self.records.contains_key(&record.name) {
            return Err(SyncError::RecordNotFound(record.name));
        }
        record.modified_at = self.tick();
        self.records.insert(record.name.clone(), record.clone());
        self.append(record.name.clone(), false);
        Ok(record)
    }

    fn delete(&mut self, name: &RecordName) -> bool {
        if self.records.remove(name).is_none() {
            return false;
        }
        self.append(name.clone(), true);
        true
    }

    fn snapshot(&self) -> ChangeBatch {
        let events = self
            .records
            .values()
            .cloned()
            .map(ChangeEvent::Changed)
            .collect();
        ChangeBatch::new(events, Some(encode_cursor(self.head)))
    }

    fn changes_since(&self, since: u64, page_size: usize) -> ChangeBatch {
        let mut pending = self.log.iter().filter(|entry| entry.sequence > since);
        let page: Vec<&LogEntry> = pending.by_ref().take(page_size).collect();
        let more_coming = pending.next().is_some();

        let last = page.last().map_or(since, |entry| entry.sequence);
        let events = page
            .into_iter()
            .filter_map(|entry| {
                if entry.deleted {
                    Some(ChangeEvent::Deleted(entry.name.clone()))
                } else {
                    // A later entry carries the deletion.
                    self.records.get(&entry.name).cloned().map(ChangeEvent::Changed)
                }
            })
            .collect();

        let batch = ChangeBatch::new(events, Some(encode_cursor(last)));
        if more_coming {
            batch.with_more_coming()
        } else {
            batch
        }
    }
}

/// Encodes a log sequence number as an opaque cursor.
pub fn encode_cursor(sequence: u64) -> Cursor {
    Cursor::from_bytes(sequence.to_be_bytes().to_vec())
}

/// Decodes a cursor produced by [`encode_cursor`].
pub fn decode_cursor(cursor: &Cursor) -> Option<u64> {
    let bytes: [u8; 8] = cursor.as_bytes().try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

/// An in-memory record service shared by any number of engines.
#[derive(Debug)]
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
    failing: Mutex<HashSet<RemoteOp>>,
    offline: AtomicBool,
    page_size: usize,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    /// Default number of log entries per change page.
    pub const DEFAULT_PAGE_SIZE: usize = 100;

    /// Creates an empty cloud.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState::new()),
            failing: Mutex::new(HashSet::new()),
            offline: AtomicBool::new(false),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the number of log entries per change page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Creates a record as if another client had saved it.
    pub fn put_record(&self, properties: PropertyMap) -> RecordName {
        self.state.lock().create(properties)
    }

    /// Overwrites properties of a record as if another client had saved it.
    pub fn update_record(
        &self,
        name: &RecordName,
        properties: PropertyMap,
    ) -> SyncResult<RemoteRecord> {
        let mut state = self.state.lock();
        let mut record = state
            .records
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::RecordNotFound(name.clone()))?;
        record.merge_properties(properties);
        state.modify(record)
    }

    /// Deletes a record as if another client had removed it.
    pub fn remove_record(&self, name: &RecordName) -> bool {
        self.state.lock().delete(name)
    }

    /// Returns a stored record.
    pub fn record(&self, name: &RecordName) -> Option<RemoteRecord> {
        self.state.lock().records.get(name).cloned()
    }

    /// Returns all stored records in name order.
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns true if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cursor of the latest change.
    pub fn head(&self) -> Cursor {
        encode_cursor(self.state.lock().head)
    }

    /// Drops the change log, expiring every cursor older than the head.
    pub fn compact(&self) {
        let mut state = self.state.lock();
        state.horizon = state.head;
        state.log.clear();
    }

    /// Moves the server clock forward.
    pub fn advance_clock(&self, by: Duration) {
        let mut state = self.state.lock();
        let now = state.clock.max(Utc::now());
        state.clock = now + by;
    }

    /// Sets the signed-in account.
    pub fn set_user(&self, user: impl Into<String>) {
        self.state.lock().user = Some(user.into());
    }

    /// Returns true once `prepare` has been called.
    pub fn is_prepared(&self) -> bool {
        self.state.lock().prepared
    }

    /// Makes every future call of `op` fail with a retryable transport error.
    pub fn fail(&self, op: RemoteOp) {
        self.failing.lock().insert(op);
    }

    /// Stops failing `op`.
    pub fn recover(&self, op: RemoteOp) {
        self.failing.lock().remove(&op);
    }

    /// Simulates losing or regaining connectivity.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    fn check(&self, op: RemoteOp) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("network unavailable"));
        }
        if self.failing.lock().contains(&op) {
            return Err(SyncError::transport_retryable(format!(
                "injected failure: {op:?}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteService for InMemoryCloud {
    async fn prepare(&self) -> SyncResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("network unavailable"));
        }
        self.state.lock().prepared = true;
        Ok(())
    }

    async fn create_record(&self, properties: PropertyMap) -> SyncResult<RecordName> {
        self.check(RemoteOp::Create)?;
        Ok(self.state.lock().create(properties))
    }

    async fn fetch_record(&self, name: &RecordName) -> SyncResult<RemoteRecord> {
        self.check(RemoteOp::Fetch)?;
        self.record(name)
            .ok_or_else(|| SyncError::RecordNotFound(name.clone()))
    }

    async fn modify_record(&self, record: RemoteRecord) -> SyncResult<RemoteRecord> {
        self.check(RemoteOp::Modify)?;
        self.state.lock().modify(record)
    }

    async fn delete_record(&self, name: &RecordName) -> SyncResult<()> {
        self.check(RemoteOp::Delete)?;
        self.state.lock().delete(name);
        Ok(())
    }

    async fn fetch_changes(&self, cursor: Option<&Cursor>) -> SyncResult<ChangeBatch> {
        self.check(RemoteOp::FetchChanges)?;
        let state = self.state.lock();
        let Some(cursor) = cursor else {
            return Ok(state.snapshot());
        };
        match decode_cursor(cursor) {
            Some(since) if since >= state.horizon && since <= state.head => {
                Ok(state.changes_since(since, self.page_size))
            }
            _ => Ok(ChangeBatch::expired()),
        }
    }

    async fn fetch_current_user(&self) -> SyncResult<String> {
        self.check(RemoteOp::FetchUser)?;
        self.state
            .lock()
            .user
            .clone()
            .ok_or_else(|| SyncError::transport_fatal("no account signed in"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_model::PropertyValue;

    fn props(title: &str) -> PropertyMap {
        let mut map = PropertyMap::new();
        map.insert("title".into(), PropertyValue::from(title));
        map
    }

    #[tokio::test]
    async fn snapshot_lists_current_records() {
        let cloud = InMemoryCloud::new();
        let a = cloud.put_record(props("a"));
        let b = cloud.put_record(props("b"));
        cloud.remove_record(&a);

        let batch = cloud.fetch_changes(None).await.unwrap();
        assert_eq!(batch.changed_count(), 1);
        assert_eq!(batch.deleted_count(), 0);
        assert!(matches!(&batch.events[0], ChangeEvent::Changed(r) if r.name == b));
        assert_eq!(batch.new_cursor, Some(cloud.head()));
    }

    #[tokio::test]
    async fn changes_since_cursor_in_order() {
        let cloud = InMemoryCloud::new();
        let a = cloud.put_record(props("a"));
        let start = cloud.head();
        let b = cloud.put_record(props("b"));
        cloud.remove_record(&a);

        let batch = cloud.fetch_changes(Some(&start)).await.unwrap();
        assert_eq!(
            batch.events,
            vec![
                ChangeEvent::Changed(cloud.record(&b).unwrap()),
                ChangeEvent::Deleted(a),
            ]
        );
        assert!(!batch.more_coming);
    }

    #[tokio::test]
    async fn pages_follow_page_size() {
        let cloud = InMemoryCloud::new().with_page_size(2);
        let start = cloud.head();
        for title in ["a", "b", "c"] {
            cloud.put_record(props(title));
        }

        let first = cloud.fetch_changes(Some(&start)).await.unwrap();
        assert_eq!(first.events.len(), 2);
        assert!(first.more_coming);

        let second = cloud
            .fetch_changes(first.new_cursor.as_ref())
            .await
            .unwrap();
        assert_eq!(second.events.len(), 1);
        assert!(!second.more_coming);
        assert_eq!(second.new_cursor, Some(cloud.head()));
    }

    #[tokio::test]
    async fn compaction_expires_old_cursors() {
        let cloud = InMemoryCloud::new();
        let old = cloud.head();
        cloud.put_record(props("a"));
        cloud.compact();

        assert!(cloud.fetch_changes(Some(&old)).await.unwrap().cursor_expired);
        let head = cloud.head();
        assert!(!cloud.fetch_changes(Some(&head)).await.unwrap().cursor_expired);
        assert!(
            cloud
                .fetch_changes(Some(&Cursor::from_bytes(vec![1, 2])))
                .await
                .unwrap()
                .cursor_expired
        );
    }

    #[tokio::test]
    async fn server_clock_is_monotonic() {
        let cloud = InMemoryCloud::new();
        let name = cloud.put_record(props("a"));
        let first = cloud.record(&name).unwrap().modified_at;
        let second = cloud.update_record(&name, props("b")).unwrap().modified_at;
        assert!(second > first);

        cloud.advance_clock(Duration::hours(1));
        let third = cloud.update_record(&name, props("c")).unwrap().modified_at;
        assert!(third >= second + Duration::hours(1));
    }

    #[tokio::test]
    async fn offline_and_injected_failures() {
        let cloud = InMemoryCloud::new();
        cloud.set_online(false);
        assert!(cloud.create_record(props("a")).await.unwrap_err().is_retryable());
        cloud.set_online(true);

        cloud.fail(RemoteOp::Fetch);
        let name = cloud.create_record(props("a")).await.unwrap();
        assert!(cloud.fetch_record(&name).await.is_err());
        cloud.recover(RemoteOp::Fetch);
        assert!(cloud.fetch_record(&name).await.is_ok());
    }

    #[tokio::test]
    async fn modify_missing_record() {
        let cloud = InMemoryCloud::new();
        let record = RemoteRecord::new("ghost", Utc::now(), props("x"));
        assert!(matches!(
            cloud.modify_record(record).await,
            Err(SyncError::RecordNotFound(_))
        ));
    }
}
