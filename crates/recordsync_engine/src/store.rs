//! Local store adapter.

use crate::error::{SyncError, SyncResult};
use parking_lot::RwLock;
use recordsync_model::{LocalKey, LocalObject, RecordName, SyncMetadata, Syncable};
use std::collections::{BTreeMap, HashMap};

/// CRUD and query access to local syncable objects.
///
/// The engine assumes a single writer at a time and does not lock the
/// store itself. Implementations use interior mutability.
pub trait LocalStore<T: Syncable>: Send + Sync {
    /// Looks up an object by local key.
    fn get(&self, key: &LocalKey) -> SyncResult<Option<LocalObject<T>>>;

    /// Looks up the object mirroring the remote record `name`.
    fn find_by_record_name(&self, name: &RecordName) -> SyncResult<Option<LocalObject<T>>>;

    /// Inserts a new object and returns it with its assigned key.
    fn insert(&self, value: T, meta: SyncMetadata) -> SyncResult<LocalObject<T>>;

    /// Writes back an existing object (metadata and properties).
    fn save(&self, object: &LocalObject<T>) -> SyncResult<()>;

    /// Deletes an object. Returns false if it did not exist.
    fn delete(&self, key: &LocalKey) -> SyncResult<bool>;

    /// Returns every object with pending local changes.
    fn unsynced(&self) -> SyncResult<Vec<LocalObject<T>>>;
}

struct MemoryTables<T> {
    objects: BTreeMap<LocalKey, LocalObject<T>>,
    by_record: HashMap<RecordName, LocalKey>,
}

/// An in-memory local store.
///
/// Keeps a record-name index so at most one local object maps to a given
/// remote record.
pub struct MemoryLocalStore<T> {
    tables: RwLock<MemoryTables<T>>,
}

impl<T: Syncable> MemoryLocalStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(MemoryTables {
                objects: BTreeMap::new(),
                by_record: HashMap::new(),
            }),
        }
    }

    /// Returns the number of objects.
    pub fn len(&self) -> usize {
        self.tables.read().objects.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all objects, ordered by key.
    pub fn all(&self) -> Vec<LocalObject<T>> {
        self.tables.read().objects.values().cloned().collect()
    }

    /// Inserts a fully formed object, keeping its key.
    pub fn put(&self, object: LocalObject<T>) -> SyncResult<()> {
        let mut tables = self.tables.write();
        Self::index(&mut tables, &object)?;
        tables.objects.insert(object.key, object);
        Ok(())
    }

    fn index(tables: &mut MemoryTables<T>, object: &LocalObject<T>) -> SyncResult<()> {
        let previous = tables
            .objects
            .get(&object.key)
            .and_then(|o| o.meta.record_name.clone());

        if let Some(name) = &object.meta.record_name {
            match tables.by_record.get(name) {
                Some(owner) if *owner != object.key => {
                    return Err(SyncError::Store(format!(
                        "record {name} is already mapped to object {owner}"
                    )));
                }
                _ => {}
            }
        }

        if let Some(old) = previous {
            tables.by_record.remove(&old);
        }
        if let Some(name) = &object.meta.record_name {
            tables.by_record.insert(name.clone(), object.key);
        }
        Ok(())
    }
}

impl<T: Syncable> Default for MemoryLocalStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Syncable> LocalStore<T> for MemoryLocalStore<T> {
    fn get(&self, key: &LocalKey) -> SyncResult<Option<LocalObject<T>>> {
        Ok(self.tables.read().objects.get(key).cloned())
    }

    fn find_by_record_name(&self, name: &RecordName) -> SyncResult<Option<LocalObject<T>>> {
        let tables = self.tables.read();
        Ok(tables
            .by_record
            .get(name)
            .and_then(|key| tables.objects.get(key))
            .cloned())
    }

    fn insert(&self, value: T, meta: SyncMetadata) -> SyncResult<LocalObject<T>> {
        let object = LocalObject {
            key: LocalKey::generate(),
            meta,
            value,
        };
        self.put(object.clone())?;
        Ok(object)
    }

    fn save(&self, object: &LocalObject<T>) -> SyncResult<()> {
        let mut tables = self.tables.write();
        if !tables.objects.contains_key(&object.key) {
            return Err(SyncError::LocalNotFound(object.key));
        }
        Self::index(&mut tables, object)?;
        tables.objects.insert(object.key, object.clone());
        Ok(())
    }

    fn delete(&self, key: &LocalKey) -> SyncResult<bool> {
        let mut tables = self.tables.write();
        match tables.objects.remove(key) {
            Some(object) => {
                if let Some(name) = object.meta.record_name {
                    tables.by_record.remove(&name);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn unsynced(&self) -> SyncResult<Vec<LocalObject<T>>> {
        Ok(self
            .tables
            .read()
            .objects
            .values()
            .filter(|o| !o.meta.synced)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Note;
    use chrono::Utc;

    fn uploaded(name: &str) -> SyncMetadata {
        SyncMetadata {
            record_name: Some(name.into()),
            modified_at: Utc::now(),
            synced: true,
        }
    }

    #[test]
    fn insert_and_lookup() {
        let store = MemoryLocalStore::new();
        let object = store.insert(Note::new("a", 1), uploaded("rec-1")).unwrap();

        assert_eq!(store.get(&object.key).unwrap(), Some(object.clone()));
        assert_eq!(
            store.find_by_record_name(&"rec-1".into()).unwrap(),
            Some(object)
        );
        assert!(store.find_by_record_name(&"rec-2".into()).unwrap().is_none());
    }

    #[test]
    fn record_name_maps_to_one_object() {
        let store = MemoryLocalStore::new();
        store.insert(Note::new("a", 1), uploaded("rec-1")).unwrap();

        let duplicate = store.insert(Note::new("b", 2), uploaded("rec-1"));
        assert!(matches!(duplicate, Err(SyncError::Store(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_reindexes_record_name() {
        let store = MemoryLocalStore::new();
        let mut object = store
            .insert(Note::new("a", 1), SyncMetadata::pending(Utc::now()))
            .unwrap();

        object.mark_uploaded("rec-9".into());
        store.save(&object).unwrap();
        assert!(store.find_by_record_name(&"rec-9".into()).unwrap().is_some());

        object.detach();
        store.save(&object).unwrap();
        assert!(store.find_by_record_name(&"rec-9".into()).unwrap().is_none());
    }

    #[test]
    fn unsynced_and_delete() {
        let store = MemoryLocalStore::new();
        let pending = store
            .insert(Note::new("a", 1), SyncMetadata::pending(Utc::now()))
            .unwrap();
        store.insert(Note::new("b", 2), uploaded("rec-2")).unwrap();

        let unsynced = store.unsynced().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].key, pending.key);

        assert!(store.delete(&pending.key).unwrap());
        assert!(!store.delete(&pending.key).unwrap());
        assert!(store.unsynced().unwrap().is_empty());
    }

    #[test]
    fn save_missing_object_fails() {
        let store = MemoryLocalStore::<Note>::new();
        let object = LocalObject {
            key: LocalKey::generate(),
            meta: SyncMetadata::pending(Utc::now()),
            value: Note::new("ghost", 0),
        };
        assert!(matches!(
            store.save(&object),
            Err(SyncError::LocalNotFound(_))
        ));
    }
}
