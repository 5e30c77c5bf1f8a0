//! Persistent change cursor.

use crate::error::SyncResult;
use crate::persistence::KeyValueStore;
use recordsync_model::Cursor;
use std::sync::Arc;

/// Stores the opaque change cursor under a fixed key.
///
/// The contents are never validated; they are produced and consumed only by
/// the remote change feed.
#[derive(Clone)]
pub struct CursorStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl CursorStore {
    /// Creates a cursor store writing under `key`.
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Returns the key the cursor is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the cursor. `None` means "fetch the full change history".
    pub fn load(&self) -> SyncResult<Option<Cursor>> {
        Ok(self.store.load(&self.key)?.map(Cursor::from_bytes))
    }

    /// Persists `cursor`.
    pub fn save(&self, cursor: &Cursor) -> SyncResult<()> {
        self.store.save(&self.key, cursor.as_bytes())
    }

    /// Discards the cursor, forcing a full resync on the next fetch.
    pub fn clear(&self) -> SyncResult<()> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for CursorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStore").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryKeyValueStore;

    #[test]
    fn cursor_lifecycle() {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let cursors = CursorStore::new(kv.clone(), "notes.change_cursor");

        assert_eq!(cursors.load().unwrap(), None);

        let cursor = Cursor::from_bytes(vec![9, 9, 9]);
        cursors.save(&cursor).unwrap();
        assert_eq!(cursors.load().unwrap(), Some(cursor));
        assert_eq!(kv.keys(), vec!["notes.change_cursor".to_string()]);

        cursors.clear().unwrap();
        assert_eq!(cursors.load().unwrap(), None);
    }

    #[test]
    fn independent_keys_do_not_collide() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let notes = CursorStore::new(Arc::clone(&kv), "notes.change_cursor");
        let tags = CursorStore::new(kv, "tags.change_cursor");

        notes.save(&Cursor::from_bytes(vec![1])).unwrap();
        assert_eq!(tags.load().unwrap(), None);
    }
}
