//! Remote service adapter.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use recordsync_model::{ChangeBatch, Cursor, PropertyMap, RecordName, RemoteRecord};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A remote record service.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (a cloud record database, an in-memory server, a mock
/// for testing). Timeouts are the implementation's responsibility.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Prepares server-side resources (record zones, push subscriptions).
    async fn prepare(&self) -> SyncResult<()> {
        Ok(())
    }

    /// Creates a record and returns the name the service assigned.
    async fn create_record(&self, properties: PropertyMap) -> SyncResult<RecordName>;

    /// Fetches a single record.
    async fn fetch_record(&self, name: &RecordName) -> SyncResult<RemoteRecord>;

    /// Saves a modified record and returns the stored version.
    async fn modify_record(&self, record: RemoteRecord) -> SyncResult<RemoteRecord>;

    /// Deletes a record.
    async fn delete_record(&self, name: &RecordName) -> SyncResult<()>;

    /// Fetches the next page of changes after `cursor`.
    ///
    /// `None` requests the full history. An expired cursor is reported
    /// either through `ChangeBatch::cursor_expired` or as
    /// `SyncError::CursorExpired`.
    async fn fetch_changes(&self, cursor: Option<&Cursor>) -> SyncResult<ChangeBatch>;

    /// Returns the identity of the signed-in account.
    async fn fetch_current_user(&self) -> SyncResult<String>;
}

/// Remote operations, used to inject failures into [`MockRemoteService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `create_record`.
    Create,
    /// `fetch_record`.
    Fetch,
    /// `modify_record`.
    Modify,
    /// `delete_record`.
    Delete,
    /// `fetch_changes`.
    FetchChanges,
    /// `fetch_current_user`.
    FetchUser,
}

/// A call observed by [`MockRemoteService`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    /// `prepare`.
    Prepare,
    /// `create_record` with the given properties.
    Create(PropertyMap),
    /// `fetch_record`.
    Fetch(RecordName),
    /// `modify_record`.
    Modify(RecordName),
    /// `delete_record`.
    Delete(RecordName),
    /// `fetch_changes` with the given cursor.
    FetchChanges(Option<Cursor>),
    /// `fetch_current_user`.
    FetchUser,
}

/// A scriptable remote service for testing.
///
/// Change-feed responses are queued with [`MockRemoteService::push_feed`];
/// once the queue is empty the feed returns an empty final page.
#[derive(Debug, Default)]
pub struct MockRemoteService {
    disconnected: AtomicBool,
    feed: Mutex<VecDeque<SyncResult<ChangeBatch>>>,
    records: Mutex<HashMap<RecordName, RemoteRecord>>,
    failing: Mutex<HashSet<RemoteOp>>,
    yielding: Mutex<HashSet<RemoteOp>>,
    next_name: AtomicU64,
    user: Mutex<Option<String>>,
    calls: Mutex<Vec<RemoteCall>>,
}

impl MockRemoteService {
    /// Creates a new mock service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a change-feed page.
    pub fn push_feed(&self, batch: ChangeBatch) {
        self.feed.lock().push_back(Ok(batch));
    }

    /// Queues a change-feed failure.
    pub fn push_feed_error(&self, error: SyncError) {
        self.feed.lock().push_back(Err(error));
    }

    /// Stores a record as if another client had saved it.
    pub fn insert_record(&self, record: RemoteRecord) {
        self.records.lock().insert(record.name.clone(), record);
    }

    /// Returns a stored record.
    pub fn record(&self, name: &RecordName) -> Option<RemoteRecord> {
        self.records.lock().get(name).cloned()
    }

    /// Makes every future call of `op` fail with a retryable transport error.
    pub fn fail(&self, op: RemoteOp) {
        self.failing.lock().insert(op);
    }

    /// Stops failing `op`.
    pub fn recover(&self, op: RemoteOp) {
        self.failing.lock().remove(&op);
    }

    /// Makes every future call of `op` yield to the scheduler once before
    /// it takes effect, so concurrent tasks can run while it is in flight.
    pub fn yield_on(&self, op: RemoteOp) {
        self.yielding.lock().insert(op);
    }

    /// Simulates losing or regaining connectivity.
    pub fn set_connected(&self, connected: bool) {
        self.disconnected.store(!connected, Ordering::SeqCst);
    }

    /// Sets the signed-in account.
    pub fn set_user(&self, user: impl Into<String>) {
        *self.user.lock() = Some(user.into());
    }

    /// Returns all calls in the order they were made.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&RemoteCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| predicate(c)).count()
    }

    async fn enter(&self, op: RemoteOp, call: RemoteCall) -> SyncResult<()> {
        self.calls.lock().push(call);
        let yielding = self.yielding.lock().contains(&op);
        if yielding {
            tokio::task::yield_now().await;
        }
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("not connected"));
        }
        if self.failing.lock().contains(&op) {
            return Err(SyncError::transport_retryable(format!("{op:?} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    async fn prepare(&self) -> SyncResult<()> {
        self.calls.lock().push(RemoteCall::Prepare);
        Ok(())
    }

    async fn create_record(&self, properties: PropertyMap) -> SyncResult<RecordName> {
        self.enter(RemoteOp::Create, RemoteCall::Create(properties.clone())).await?;
        let n = self.next_name.fetch_add(1, Ordering::SeqCst) + 1;
        let name = RecordName::new(format!("mock-{n}"));
        self.insert_record(RemoteRecord::new(name.clone(), Utc::now(), properties));
        Ok(name)
    }

    async fn fetch_record(&self, name: &RecordName) -> SyncResult<RemoteRecord> {
        self.enter(RemoteOp::Fetch, RemoteCall::Fetch(name.clone())).await?;
        self.record(name)
            .ok_or_else(|| SyncError::RecordNotFound(name.clone()))
    }

    async fn modify_record(&self, mut record: RemoteRecord) -> SyncResult<RemoteRecord> {
        self.enter(RemoteOp::Modify, RemoteCall::Modify(record.name.clone())).await?;
        let mut records = self.records.lock();
        if !records.contains_key(&record.name) {
            return Err(SyncError::RecordNotFound(record.name));
        }
        record.modified_at = Utc::now();
        records.insert(record.name.clone(), record.clone());
        Ok(record)
    }

    async fn delete_record(&self, name: &RecordName) -> SyncResult<()> {
        self.enter(RemoteOp::Delete, RemoteCall::Delete(name.clone())).await?;
        self.records.lock().remove(name);
        Ok(())
    }

    async fn fetch_changes(&self, cursor: Option<&Cursor>) -> SyncResult<ChangeBatch> {
        self.enter(
            RemoteOp::FetchChanges,
            RemoteCall::FetchChanges(cursor.cloned()),
        )
        .await?;
        self.feed
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ChangeBatch::default()))
    }

    async fn fetch_current_user(&self) -> SyncResult<String> {
        self.enter(RemoteOp::FetchUser, RemoteCall::FetchUser).await?;
        self.user
            .lock()
            .clone()
            .ok_or_else(|| SyncError::transport_fatal("no account signed in"))
    }
}
