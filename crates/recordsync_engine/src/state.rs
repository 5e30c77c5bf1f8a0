//! Engine state, statistics and pass reports.

use crate::error::SyncError;
use recordsync_model::{LocalKey, RecordName};
use std::time::{Duration, Instant};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, no pass has run yet.
    Idle,
    /// Engine is draining the remote change feed.
    Fetching,
    /// Engine is waiting before a full resync after cursor expiry.
    RetryWait,
    /// Engine is uploading pending local objects.
    Uploading,
    /// Engine has completed a sync pass.
    Synced,
    /// The last pass failed.
    Error,
}

impl SyncState {
    /// Returns true while a pass is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::Fetching | SyncState::RetryWait | SyncState::Uploading
        )
    }

    /// Returns true if the engine can start a new pass.
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

/// Statistics accumulated across passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that completed successfully.
    pub passes_completed: u64,
    /// Passes that failed.
    pub passes_failed: u64,
    /// Remote records applied locally (inserted or overwritten).
    pub records_applied: u64,
    /// Local objects deleted because of remote deletions.
    pub records_deleted: u64,
    /// Local objects uploaded (created or modified).
    pub objects_uploaded: u64,
    /// Individual upload failures.
    pub upload_failures: u64,
    /// Full resyncs triggered by cursor expiry.
    pub cursor_resets: u64,
    /// Completion time of the last successful pass.
    pub last_sync_time: Option<Instant>,
    /// Last pass-level error message.
    pub last_error: Option<String>,
}

/// An upload that failed during a pass.
#[derive(Debug)]
pub struct UploadFailure {
    /// The object that could not be uploaded.
    pub key: LocalKey,
    /// Why it failed.
    pub error: SyncError,
}

/// Result of one successful sync pass.
///
/// Upload failures do not fail the pass; they are listed here and the
/// affected objects stay pending for the next pass.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Remote records inserted locally.
    pub inserted: u64,
    /// Local objects overwritten by newer remote records.
    pub updated: u64,
    /// Local objects that won a conflict and were queued for upload.
    pub kept_local: u64,
    /// Local objects deleted because of remote deletions.
    pub deleted: u64,
    /// Remote records skipped because their properties did not decode.
    pub rejected: Vec<RecordName>,
    /// Remote records created from local objects.
    pub created: u64,
    /// Remote records modified from local objects.
    pub modified: u64,
    /// Uploads that failed.
    pub upload_failures: Vec<UploadFailure>,
    /// Change-feed pages fetched, across resyncs.
    pub pages: u32,
    /// Full resyncs caused by cursor expiry.
    pub cursor_resets: u32,
    /// True if a new cursor was persisted.
    pub cursor_committed: bool,
    /// True if the page limit stopped the pass before the feed was drained.
    pub more_coming: bool,
    /// Duration of the pass.
    pub duration: Duration,
}

impl SyncReport {
    /// Number of remote records applied locally.
    pub fn applied(&self) -> u64 {
        self.inserted + self.updated
    }

    /// Number of local objects uploaded.
    pub fn uploaded(&self) -> u64 {
        self.created + self.modified
    }

    /// Returns true if every upload succeeded.
    pub fn is_clean(&self) -> bool {
        self.upload_failures.is_empty() && self.rejected.is_empty()
    }
}
