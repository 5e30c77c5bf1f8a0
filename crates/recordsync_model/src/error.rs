//! Error types for property transfer.

use thiserror::Error;

/// Result type for property operations.
pub type PropertyResult<T> = Result<T, PropertyError>;

/// Errors raised while moving properties between objects and records.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyError {
    /// A property value had the wrong type for its field.
    #[error("property '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        /// Field name (empty until attached by the caller).
        field: String,
        /// Expected value kind.
        expected: &'static str,
        /// Actual value kind.
        found: &'static str,
    },

    /// A syncable type declared a field with an empty name.
    #[error("field name must not be empty")]
    EmptyFieldName,

    /// A syncable type declared the same field twice.
    #[error("duplicate field name: {0}")]
    DuplicateField(&'static str),

    /// A syncable type declared no fields at all.
    #[error("syncable type {0} declares no fields")]
    NoFields(&'static str),
}

impl PropertyError {
    /// Creates a type mismatch error without a field name.
    pub fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch {
            field: String::new(),
            expected,
            found,
        }
    }

    /// Attaches a field name to a type mismatch.
    pub fn with_field(self, name: &str) -> Self {
        match self {
            Self::TypeMismatch {
                expected, found, ..
            } => Self::TypeMismatch {
                field: name.to_string(),
                expected,
                found,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_display_includes_field() {
        let err = PropertyError::mismatch("text", "integer").with_field("title");
        assert_eq!(
            err.to_string(),
            "property 'title': expected text, found integer"
        );
    }

    #[test]
    fn with_field_leaves_other_errors_alone() {
        let err = PropertyError::DuplicateField("title").with_field("body");
        assert_eq!(err, PropertyError::DuplicateField("title"));
    }
}
