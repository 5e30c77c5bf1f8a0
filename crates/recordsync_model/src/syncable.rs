//! Syncable object contract.
//!
//! Property transfer is declared statically: each syncable type lists its
//! fields as `(name, get, set)` triples instead of relying on reflection.
//! The list is validated once, when an engine is constructed.

use crate::error::{PropertyError, PropertyResult};
use crate::value::{PropertyMap, PropertyValue};
use std::collections::HashSet;
use std::fmt;

/// A single synced field of `T`.
pub struct Field<T> {
    /// Property name used on the remote record.
    pub name: &'static str,
    /// Reads the field as a property value.
    pub get: fn(&T) -> PropertyValue,
    /// Writes a property value into the field.
    pub set: fn(&mut T, PropertyValue) -> PropertyResult<()>,
}

impl<T> Field<T> {
    /// Creates a field declaration.
    pub const fn new(
        name: &'static str,
        get: fn(&T) -> PropertyValue,
        set: fn(&mut T, PropertyValue) -> PropertyResult<()>,
    ) -> Self {
        Self { name, get, set }
    }
}

impl<T> fmt::Debug for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field").field("name", &self.name).finish()
    }
}

/// An application type that can be mirrored to a remote record.
///
/// # Example
///
/// ```
/// use recordsync_model::{Field, PropertyValue, Syncable};
///
/// #[derive(Debug, Clone, Default, PartialEq)]
/// struct Task {
///     title: String,
///     done: bool,
/// }
///
/// static TASK_FIELDS: [Field<Task>; 2] = [
///     Field::new(
///         "title",
///         |t: &Task| PropertyValue::from(t.title.clone()),
///         |t: &mut Task, v: PropertyValue| {
///             t.title = v.try_into()?;
///             Ok(())
///         },
///     ),
///     Field::new(
///         "done",
///         |t: &Task| PropertyValue::from(t.done),
///         |t: &mut Task, v: PropertyValue| {
///             t.done = v.try_into()?;
///             Ok(())
///         },
///     ),
/// ];
///
/// impl Syncable for Task {
///     const RECORD_TYPE: &'static str = "Task";
///
///     fn fields() -> &'static [Field<Self>] {
///         &TASK_FIELDS
///     }
/// }
///
/// let task = Task { title: "write docs".into(), done: false };
/// let props = task.to_properties();
/// assert_eq!(Task::from_properties(&props).unwrap(), task);
/// ```
pub trait Syncable: fmt::Debug + Default + Clone + Send + Sync + 'static {
    /// Remote record type name.
    const RECORD_TYPE: &'static str;

    /// The fields transferred to and from remote records.
    fn fields() -> &'static [Field<Self>];

    /// Produces the property map restricted to the declared fields.
    fn to_properties(&self) -> PropertyMap {
        Self::fields()
            .iter()
            .map(|field| (field.name.to_string(), (field.get)(self)))
            .collect()
    }

    /// Overwrites declared fields from `properties`.
    ///
    /// Fields missing from the map keep their current value. The update is
    /// all-or-nothing: on a type mismatch `self` is left unchanged.
    fn apply_properties(&mut self, properties: &PropertyMap) -> PropertyResult<()> {
        let mut next = self.clone();
        for field in Self::fields() {
            if let Some(value) = properties.get(field.name) {
                (field.set)(&mut next, value.clone()).map_err(|e| e.with_field(field.name))?;
            }
        }
        *self = next;
        Ok(())
    }

    /// Builds a new value from `properties`, starting from `Default`.
    fn from_properties(properties: &PropertyMap) -> PropertyResult<Self> {
        let mut value = Self::default();
        value.apply_properties(properties)?;
        Ok(value)
    }
}

/// Checks that `T` declares at least one field and that names are unique
/// and non-empty.
pub fn validate_fields<T: Syncable>() -> PropertyResult<()> {
    let fields = T::fields();
    if fields.is_empty() {
        return Err(PropertyError::NoFields(T::RECORD_TYPE));
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if field.name.is_empty() {
            return Err(PropertyError::EmptyFieldName);
        }
        if !seen.insert(field.name) {
            return Err(PropertyError::DuplicateField(field.name));
        }
    }
    Ok(())
}
