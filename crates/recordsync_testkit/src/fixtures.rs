//! Test fixtures: a sample syncable type, a recording observer and
//! simulated devices.

use crate::cloud::InMemoryCloud;
use parking_lot::Mutex;
use recordsync_engine::{
    FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, MemoryLocalStore, SyncConfig,
    SyncEngine, SyncObserver,
};
use recordsync_model::{Field, LocalObject, PropertyMap, PropertyValue, RecordName, Syncable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A small syncable note.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Note {
    /// Title.
    pub title: String,
    /// Priority, higher first.
    pub priority: i64,
    /// Whether the note is done.
    pub done: bool,
}

impl Note {
    /// Creates an open note.
    pub fn new(title: impl Into<String>, priority: i64) -> Self {
        Self {
            title: title.into(),
            priority,
            done: false,
        }
    }

    /// Returns the properties of a new note, as another client would save them.
    pub fn props(title: &str, priority: i64) -> PropertyMap {
        Note::new(title, priority).to_properties()
    }
}

static NOTE_FIELDS: [Field<Note>; 3] = [
    Field::new(
        "title",
        |note: &Note| PropertyValue::from(note.title.clone()),
        |note: &mut Note, value: PropertyValue| {
            note.title = value.try_into()?;
            Ok(())
        },
    ),
    Field::new(
        "priority",
        |note: &Note| PropertyValue::from(note.priority),
        |note: &mut Note, value: PropertyValue| {
            note.priority = value.try_into()?;
            Ok(())
        },
    ),
    Field::new(
        "done",
        |note: &Note| PropertyValue::from(note.done),
        |note: &mut Note, value: PropertyValue| {
            note.done = value.try_into()?;
            Ok(())
        },
    ),
];

impl Syncable for Note {
    const RECORD_TYPE: &'static str = "Note";

    fn fields() -> &'static [Field<Self>] {
        &NOTE_FIELDS
    }
}

/// An external change reported to an observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// `on_external_insert`.
    Inserted(Note),
    /// `on_external_update`.
    Updated(Note),
    /// `on_external_delete`.
    Deleted(RecordName),
}

/// Observer that records every callback in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    /// Returns the recorded events.
    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of deletions reported for `name`.
    pub fn deletions_of(&self, name: &RecordName) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| matches!(event, ObservedEvent::Deleted(n) if n == name))
            .count()
    }

    /// Clears the recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl SyncObserver<Note> for RecordingObserver {
    fn on_external_insert(&self, object: &LocalObject<Note>) {
        self.events
            .lock()
            .push(ObservedEvent::Inserted(object.value.clone()));
    }

    fn on_external_update(&self, object: &LocalObject<Note>) {
        self.events
            .lock()
            .push(ObservedEvent::Updated(object.value.clone()));
    }

    fn on_external_delete(&self, record_name: &RecordName) {
        self.events
            .lock()
            .push(ObservedEvent::Deleted(record_name.clone()));
    }
}

/// Engine type used by [`Device`].
pub type NoteEngine = SyncEngine<Note, MemoryLocalStore<Note>, InMemoryCloud>;

/// A simulated client: a local store and an engine attached to a cloud.
pub struct Device {
    /// The engine.
    pub engine: NoteEngine,
    /// The local store.
    pub store: Arc<MemoryLocalStore<Note>>,
    /// Observer installed on the engine.
    pub observer: Arc<RecordingObserver>,
    /// Persistence used for the cursor and account.
    pub defaults: Arc<dyn KeyValueStore>,
}

impl Device {
    /// Creates a device with in-memory persistence.
    pub fn new(cloud: Arc<InMemoryCloud>) -> Self {
        Self::with_config(cloud, SyncConfig::for_type::<Note>())
    }

    /// Creates a device with in-memory persistence and a custom config.
    pub fn with_config(cloud: Arc<InMemoryCloud>, config: SyncConfig) -> Self {
        Self::with_defaults(cloud, config, Arc::new(MemoryKeyValueStore::new()))
    }

    /// Creates a device over the given persistence.
    pub fn with_defaults(
        cloud: Arc<InMemoryCloud>,
        config: SyncConfig,
        defaults: Arc<dyn KeyValueStore>,
    ) -> Self {
        let store = Arc::new(MemoryLocalStore::new());
        let observer = Arc::new(RecordingObserver::default());
        let engine: NoteEngine =
            SyncEngine::new(config, Arc::clone(&store), cloud, Arc::clone(&defaults))
                .expect("note fields are valid")
                .with_observer(observer.clone());
        Self {
            engine,
            store,
            observer,
            defaults,
        }
    }

    /// Returns every local note, sorted.
    pub fn notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self.store.all().into_iter().map(|o| o.value).collect();
        notes.sort();
        notes
    }

    /// Returns the local object mirroring `name`.
    pub fn object(&self, name: &RecordName) -> Option<LocalObject<Note>> {
        self.store
            .all()
            .into_iter()
            .find(|object| object.record_name() == Some(name))
    }

    /// Returns the local object titled `title`.
    pub fn find(&self, title: &str) -> Option<LocalObject<Note>> {
        self.store
            .all()
            .into_iter()
            .find(|object| object.value.title == title)
    }
}

/// A state file in a temporary directory, removed on drop.
pub struct TempStateFile {
    dir: TempDir,
}

impl TempStateFile {
    /// Creates a temporary directory for a state file.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp directory"),
        }
    }

    /// Returns the state file path.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("sync-state.cbor")
    }

    /// Opens the state file. Only one handle may be open at a time.
    pub fn open(&self) -> Arc<FileKeyValueStore> {
        Arc::new(FileKeyValueStore::open(self.path()).expect("failed to open state file"))
    }
}

impl Default for TempStateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Sorts notes for order-independent comparison.
pub fn sorted(mut notes: Vec<Note>) -> Vec<Note> {
    notes.sort();
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordsync_model::validate_fields;

    #[test]
    fn note_fields_are_valid() {
        assert!(validate_fields::<Note>().is_ok());
        let note = Note::new("x", 3);
        assert_eq!(Note::from_properties(&note.to_properties()).unwrap(), note);
    }

    #[test]
    fn temp_state_file_reopens() {
        let state = TempStateFile::new();
        {
            let store = state.open();
            store.save("k", b"v").unwrap();
        }
        assert_eq!(state.open().load("k").unwrap(), Some(b"v".to_vec()));
    }
}
