//! Shared unit test fixtures.

use crate::observer::SyncObserver;
use parking_lot::Mutex;
use recordsync_model::{Field, LocalObject, PropertyValue, RecordName, Syncable};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Note {
    pub title: String,
    pub priority: i64,
}

impl Note {
    pub fn new(title: &str, priority: i64) -> Self {
        Self {
            title: title.to_string(),
            priority,
        }
    }
}

static NOTE_FIELDS: [Field<Note>; 2] = [
    Field::new(
        "title",
        |n: &Note| PropertyValue::from(n.title.clone()),
        |n: &mut Note, v: PropertyValue| {
            n.title = v.try_into()?;
            Ok(())
        },
    ),
    Field::new(
        "priority",
        |n: &Note| PropertyValue::from(n.priority),
        |n: &mut Note, v: PropertyValue| {
            n.priority = v.try_into()?;
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

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Event {
    Inserted(Note),
    Updated(Note),
    Deleted(RecordName),
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl SyncObserver<Note> for RecordingObserver {
    fn on_external_insert(&self, object: &LocalObject<Note>) {
        self.events.lock().push(Event::Inserted(object.value.clone()));
    }

    fn on_external_update(&self, object: &LocalObject<Note>) {
        self.events.lock().push(Event::Updated(object.value.clone()));
    }

    fn on_external_delete(&self, record_name: &RecordName) {
        self.events.lock().push(Event::Deleted(record_name.clone()));
    }
}
