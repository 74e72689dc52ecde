//! Identifier newtypes with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
}

/// Generates a validated string ID newtype with common trait implementations.
///
/// Surrounding whitespace is trimmed before the emptiness check, since labels
/// arrive from spreadsheet cells.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                let trimmed = id.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if trimmed.len() == id.len() {
                    Ok(Self(id))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Returns the ID as a string slice.
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
            fn from(id: $name) -> Self {
                id.0
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

define_string_id!(
    /// A validated area identifier.
    ///
    /// An area is one floor of one building, identified by a compact label
    /// such as `LIB-2`. Labels are resolved by the external computer classifier.
    AreaId, "area ID"
);

define_string_id!(
    /// A validated building identifier.
    ///
    /// Buildings group areas for roll-up statistics.
    BuildingId, "building ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_id_rejects_empty() {
        assert!(AreaId::new("").is_err());
        assert!(AreaId::new("   ").is_err());
        assert!(AreaId::new("LIB-2").is_ok());
    }

    #[test]
    fn area_id_trims_whitespace() {
        let id = AreaId::new("  LIB-2 ").unwrap();
        assert_eq!(id.as_str(), "LIB-2");
    }

    #[test]
    fn building_id_rejects_empty() {
        let err = BuildingId::new("").unwrap_err();
        assert_eq!(err.to_string(), "building ID cannot be empty");
    }

    #[test]
    fn area_id_serde_roundtrip() {
        let id = AreaId::new("SCI-1").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"SCI-1\"");
        let parsed: AreaId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn area_id_serde_rejects_empty() {
        let result: Result<AreaId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn area_ids_order_lexicographically() {
        let mut ids = vec![
            AreaId::new("SCI-1").unwrap(),
            AreaId::new("LIB-2").unwrap(),
            AreaId::new("LIB-1").unwrap(),
        ];
        ids.sort();
        let names: Vec<_> = ids.iter().map(AreaId::as_str).collect();
        assert_eq!(names, ["LIB-1", "LIB-2", "SCI-1"]);
    }
}
