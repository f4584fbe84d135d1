//! Identifier newtypes.
//!
//! Renderer contexts are named by the host ([`ContextId`]); everything the
//! orchestrator names itself ([`HandleId`], [`TransitionId`]) is a prefixed
//! UUID v7 so log lines sort by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

branded_id! {
    /// Orchestrator-local identity of one renderer handle.
    HandleId, "page"
}

branded_id! {
    /// Correlates the log lines of one navigation verb.
    TransitionId, "nav"
}

/// Identifier the host assigns to a renderer context once it exists.
///
/// Hosts send these either as numbers or strings, so both deserialize.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    /// Wrap a host-supplied identifier.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Return the inner string as a slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ContextId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Str(String),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Self(n.to_string()),
            Raw::Str(s) => Self(s),
        })
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u64> for ContextId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_id_has_prefix() {
        let id = HandleId::new();
        assert!(id.as_str().starts_with("page_"), "got: {id}");
    }

    #[test]
    fn transition_id_has_prefix() {
        let id = TransitionId::new();
        assert!(id.as_str().starts_with("nav_"), "got: {id}");
    }

    #[test]
    fn handle_ids_are_unique() {
        assert_ne!(HandleId::new(), HandleId::new());
    }

    #[test]
    fn context_id_accepts_numbers_and_strings() {
        let from_num: ContextId = serde_json::from_str("42").unwrap();
        let from_str: ContextId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(from_num.as_str(), "42");
    }

    #[test]
    fn context_id_serializes_as_string() {
        let id = ContextId::from(7_u64);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"7\"");
    }
}
