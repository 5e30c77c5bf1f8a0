//! Property-based test generators using proptest.

use crate::fixtures::Note;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use recordsync_model::{PropertyMap, PropertyValue};

/// Strategy for generating timestamps within a few days of a fixed epoch.
///
/// Values are millisecond-aligned, like server timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..(4 * 24 * 3600 * 1000)).prop_map(|millis| base_time() + Duration::milliseconds(millis))
}

/// Strategy for generating a pair of timestamps that are often equal.
pub fn timestamp_pair_strategy() -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
    prop_oneof![
        timestamp_strategy().prop_map(|t| (t, t)),
        (timestamp_strategy(), timestamp_strategy()),
    ]
}

/// Strategy for generating note titles.
pub fn title_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9 ]{0,15}").expect("Invalid regex")
}

/// Strategy for generating notes.
pub fn note_strategy() -> impl Strategy<Value = Note> {
    (title_strategy(), -5i64..100, any::<bool>()).prop_map(|(title, priority, done)| Note {
        title,
        priority,
        done,
    })
}

/// Strategy for generating arbitrary property values.
pub fn property_value_strategy() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        Just(PropertyValue::Null),
        any::<bool>().prop_map(PropertyValue::Bool),
        any::<i64>().prop_map(PropertyValue::Integer),
        (-1.0e9f64..1.0e9).prop_map(PropertyValue::Real),
        "[ -~]{0,24}".prop_map(PropertyValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(PropertyValue::Bytes),
        timestamp_strategy().prop_map(PropertyValue::Timestamp),
    ]
}

/// Strategy for generating property maps with arbitrary field names.
pub fn property_map_strategy() -> impl Strategy<Value = PropertyMap> {
    prop::collection::btree_map("[a-z]{1,8}", property_value_strategy(), 0..6)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}
