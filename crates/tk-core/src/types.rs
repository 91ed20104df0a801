//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a patch. Patches are named by random v4 UUIDs so that
/// devices can create them independently without coordination.
pub type PatchId = Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// The provided value contained whitespace.
    #[error("{field} cannot contain whitespace: {value:?}")]
    Whitespace { field: &'static str, value: String },
}

/// Generates a validated string newtype with common trait implementations.
macro_rules! define_label {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new value after validation.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(ValidationError::Whitespace {
                        field: $field_name,
                        value,
                    });
                }
                Ok(Self(value))
            }

            /// Returns the value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_label!(
    /// A free-form label attached to an event.
    ///
    /// Tags are case-sensitive and may not contain whitespace, since the CLI
    /// takes them as separate positional arguments.
    Tag, "tag"
);

define_label!(
    /// A validated event identifier.
    ///
    /// New events get a v4 UUID string, but any non-empty token is accepted
    /// when reading patches written by other devices.
    EventId, "event ID"
);

impl EventId {
    /// Generates a fresh random event identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the first eight characters, used for display.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map_or(self.0.len(), |(idx, _)| idx);
        &self.0[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_rejects_empty() {
        assert_eq!(Tag::new(""), Err(ValidationError::Empty { field: "tag" }));
        assert!(Tag::new("work").is_ok());
    }

    #[test]
    fn tag_rejects_whitespace() {
        let err = Tag::new("deep work").unwrap_err();
        assert_eq!(err.to_string(), "tag cannot contain whitespace: \"deep work\"");
        assert!(Tag::new("tab\there").is_err());
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert_ne!(Tag::new("Work").unwrap(), Tag::new("work").unwrap());
    }

    #[test]
    fn tag_serde_rejects_empty() {
        let result: Result<Tag, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn tag_serde_is_plain_string() {
        let tag = Tag::new("coding").unwrap();
        assert_eq!(serde_json::to_string(&tag).unwrap(), "\"coding\"");
    }

    #[test]
    fn event_id_short_prefix() {
        let id = EventId::new("0c435b19-4504-440c-abc7-f4e4d6a7d25f").unwrap();
        assert_eq!(id.short(), "0c435b19");

        let id = EventId::new("a").unwrap();
        assert_eq!(id.short(), "a");
    }

    #[test]
    fn generated_event_ids_are_unique() {
        assert_ne!(EventId::generate(), EventId::generate());
    }
}
