//! Property values carried between local objects and remote records.

use crate::error::{PropertyError, PropertyResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Property name to value mapping, ordered by name.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A single property value.
///
/// The variants mirror the scalar types a record service can store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Point in time (UTC).
    Timestamp(DateTime<Utc>),
}

impl PropertyValue {
    /// Returns the name of this value's kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Null => "null",
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Integer(_) => "integer",
            PropertyValue::Real(_) => "real",
            PropertyValue::Text(_) => "text",
            PropertyValue::Bytes(_) => "bytes",
            PropertyValue::Timestamp(_) => "timestamp",
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Returns the text if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Integer` value.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PropertyValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

macro_rules! impl_value_conversions {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl From<$ty> for PropertyValue {
            fn from(value: $ty) -> Self {
                PropertyValue::$variant(value)
            }
        }

        impl TryFrom<PropertyValue> for $ty {
            type Error = PropertyError;

            fn try_from(value: PropertyValue) -> PropertyResult<Self> {
                match value {
                    PropertyValue::$variant(inner) => Ok(inner),
                    other => Err(PropertyError::mismatch($kind, other.kind())),
                }
            }
        }

        impl TryFrom<PropertyValue> for Option<$ty> {
            type Error = PropertyError;

            fn try_from(value: PropertyValue) -> PropertyResult<Self> {
                match value {
                    PropertyValue::Null => Ok(None),
                    PropertyValue::$variant(inner) => Ok(Some(inner)),
                    other => Err(PropertyError::mismatch($kind, other.kind())),
                }
            }
        }

        impl From<Option<$ty>> for PropertyValue {
            fn from(value: Option<$ty>) -> Self {
                value.map_or(PropertyValue::Null, PropertyValue::$variant)
            }
        }
    };
}

impl_value_conversions!(bool, Bool, "bool");
impl_value_conversions!(i64, Integer, "integer");
impl_value_conversions!(f64, Real, "real");
impl_value_conversions!(String, Text, "text");
impl_value_conversions!(Vec<u8>, Bytes, "bytes");
impl_value_conversions!(DateTime<Utc>, Timestamp, "timestamp");

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(PropertyValue::from("hi"), PropertyValue::Text("hi".into()));
        assert_eq!(i64::try_from(PropertyValue::Integer(7)).unwrap(), 7);
        assert_eq!(
            Option::<String>::try_from(PropertyValue::Null).unwrap(),
            None
        );
        assert_eq!(PropertyValue::from(None::<f64>), PropertyValue::Null);
    }

    #[test]
    fn mismatch_reports_kinds() {
        let err = String::try_from(PropertyValue::Real(1.5)).unwrap_err();
        assert_eq!(err, PropertyError::mismatch("text", "real"));
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&PropertyValue::Integer(3)).unwrap();
        assert_eq!(json, r#"{"Integer":3}"#);
        let back: PropertyValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, PropertyValue::Integer(3));
    }
}
