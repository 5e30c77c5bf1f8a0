//! Configuration for the sync engine.

use recordsync_model::Syncable;
use std::time::Duration;

/// Delay before a full resync after the server rejects the cursor.
pub const DEFAULT_CURSOR_RESET_BACKOFF: Duration = Duration::from_secs(3);

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Prefix for every persisted key owned by the engine.
    ///
    /// Engines syncing different entity types must use different
    /// namespaces so their cursors do not collide.
    pub namespace: String,
    /// Wait before restarting a pass after cursor expiry.
    pub cursor_reset_backoff: Duration,
    /// Maximum change-feed pages drained per pass (`None` = until drained).
    pub max_pages_per_pass: Option<u32>,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            cursor_reset_backoff: DEFAULT_CURSOR_RESET_BACKOFF,
            max_pages_per_pass: None,
        }
    }

    /// Creates a configuration namespaced by the record type of `T`.
    pub fn for_type<T: Syncable>() -> Self {
        Self::new(format!("recordsync.{}", T::RECORD_TYPE))
    }

    /// Sets the cursor-expiry backoff.
    pub fn with_cursor_reset_backoff(mut self, backoff: Duration) -> Self {
        self.cursor_reset_backoff = backoff;
        self
    }

    /// Limits the number of pages drained per pass.
    pub fn with_max_pages_per_pass(mut self, pages: u32) -> Self {
        self.max_pages_per_pass = Some(pages.max(1));
        self
    }

    /// Persisted key of the change cursor.
    pub fn cursor_key(&self) -> String {
        format!("{}.change_cursor", self.namespace)
    }

    /// Persisted key of the last known account identity.
    pub fn account_key(&self) -> String {
        format!("{}.account", self.namespace)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("recordsync")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("app.notes")
            .with_cursor_reset_backoff(Duration::from_millis(50))
            .with_max_pages_per_pass(4);

        assert_eq!(config.namespace, "app.notes");
        assert_eq!(config.cursor_reset_backoff, Duration::from_millis(50));
        assert_eq!(config.max_pages_per_pass, Some(4));
    }

    #[test]
    fn default_backoff_is_three_seconds() {
        let config = SyncConfig::default();
        assert_eq!(config.cursor_reset_backoff, Duration::from_secs(3));
        assert_eq!(config.max_pages_per_pass, None);
    }

    #[test]
    fn persisted_keys_are_namespaced() {
        let notes = SyncConfig::new("app.notes");
        let tags = SyncConfig::new("app.tags");
        assert_eq!(notes.cursor_key(), "app.notes.change_cursor");
        assert_eq!(notes.account_key(), "app.notes.account");
        assert_ne!(notes.cursor_key(), tags.cursor_key());
    }

    #[test]
    fn zero_page_limit_is_clamped() {
        let config = SyncConfig::default().with_max_pages_per_pass(0);
        assert_eq!(config.max_pages_per_pass, Some(1));
    }
}
