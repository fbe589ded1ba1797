//! Typed identifiers for the keys the live tables are indexed by.
//!
//! Task ids and job ids come from different server-side namespaces but often
//! share a format (small integers). Keeping them as distinct types means a
//! generation session can never be looked up with a job id by accident.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Accepts either a JSON string or a JSON integer and normalises it to text.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Uint(u64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(value) => value,
            RawId::Int(value) => value.to_string(),
            RawId::Uint(value) => value.to_string(),
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                RawId::deserialize(deserializer).map(|raw| Self(raw.into()))
            }
        }
    };
}

string_id!(
    /// Server-assigned key of one in-flight text generation.
    TaskId
);
string_id!(
    /// Key of one build/preview job.
    JobId
);
string_id!(
    /// Code revision a build runs against.
    RevisionId
);
string_id!(
    /// Chat thread a view is showing.
    ThreadId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_string_ids_normalise_to_the_same_key() {
        let from_int: JobId = serde_json::from_str("42").unwrap();
        let from_text: JobId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_int, from_text);
        assert_eq!(from_int.as_str(), "42");
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TaskId::new("t1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t1\"");
    }

    #[test]
    fn rejects_non_scalar_ids() {
        assert!(serde_json::from_str::<RevisionId>("{\"id\": 1}").is_err());
    }
}
