//! Key-value persistence for engine state.
//!
//! The engine persists two small blobs: the change cursor and the last
//! known account identity. Both go through a [`KeyValueStore`], which the
//! host environment provides.
//!
//! ```text
//! <state_file>        # CBOR map of key -> bytes
//! <state_file>.lock   # Advisory lock for single-process access
//! ```

use crate::error::{SyncError, SyncResult};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Current on-disk format version of the state file.
const STATE_FORMAT_VERSION: u32 = 1;

/// Durable key-value storage for small opaque blobs.
pub trait KeyValueStore: Send + Sync {
    /// Loads the value stored under `key`.
    fn load(&self, key: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn save(&self, key: &str, value: &[u8]) -> SyncResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> SyncResult<()>;
}

/// An in-memory key-value store for testing.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryKeyValueStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    version: u32,
    entries: BTreeMap<String, Vec<u8>>,
}

/// A key-value store backed by a single CBOR file.
///
/// Every write rewrites the file through a temporary sibling and an atomic
/// rename, so a crash leaves either the old or the new state. The store
/// holds an exclusive advisory lock for its lifetime.
///
/// # Example
///
/// ```rust,ignore
/// use recordsync_engine::FileKeyValueStore;
///
/// let store = FileKeyValueStore::open("state.cbor")?;
/// store.save("notes.change_cursor", &[1, 2, 3])?;
/// ```
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    state: Mutex<StateFile>,
    _lock_file: File,
}

impl FileKeyValueStore {
    /// Opens the state file at `path`, creating it on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if another process holds the lock, or if the
    /// existing file cannot be decoded.
    pub fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(Self::sibling(&path, "lock"))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(SyncError::Persistence(format!(
                "state file is locked by another process: {}",
                path.display()
            )));
        }

        let state = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let state: StateFile =
                ciborium::de::from_reader(reader).map_err(|e| SyncError::Codec(e.to_string()))?;
            if state.version != STATE_FORMAT_VERSION {
                return Err(SyncError::Persistence(format!(
                    "unsupported state file version {}",
                    state.version
                )));
            }
            state
        } else {
            StateFile {
                version: STATE_FORMAT_VERSION,
                entries: BTreeMap::new(),
            }
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns all stored keys.
    pub fn keys(&self) -> Vec<String> {
        self.state.lock().entries.keys().cloned().collect()
    }

    fn sibling(path: &Path, extension: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(extension);
        PathBuf::from(name)
    }

    fn flush(&self, state: &StateFile) -> SyncResult<()> {
        let temp_path = Self::sibling(&self.path, "tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            ciborium::ser::into_writer(state, &mut writer)
                .map_err(|e| SyncError::Codec(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn load(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        Ok(self.state.lock().entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.entries.insert(key.to_string(), value.to_vec());
        self.flush(&state)
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.entries.remove(key).is_some() {
            self.flush(&state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.load("k").unwrap(), None);

        store.save("k", b"value").unwrap();
        assert_eq!(store.load("k").unwrap(), Some(b"value".to_vec()));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.load("k").unwrap(), None);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.cbor");

        {
            let store = FileKeyValueStore::open(&path).unwrap();
            store.save("notes.change_cursor", &[1, 2, 3]).unwrap();
            store.save("notes.account", b"user-1").unwrap();
            store.remove("notes.account").unwrap();
        }

        let store = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(
            store.load("notes.change_cursor").unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(store.load("notes.account").unwrap(), None);
        assert_eq!(store.keys(), vec!["notes.change_cursor".to_string()]);
    }

    #[test]
    fn file_store_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.cbor");

        let _first = FileKeyValueStore::open(&path).unwrap();
        let second = FileKeyValueStore::open(&path);
        assert!(matches!(second, Err(SyncError::Persistence(_))));
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.cbor");
        fs::write(&path, b"not cbor at all").unwrap();

        let result = FileKeyValueStore::open(&path);
        assert!(result.is_err());
    }
}
