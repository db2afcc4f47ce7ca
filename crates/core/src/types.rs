//! Identifier types for the wire layer
//!
//! This module defines:
//! - TypeKey: stable fully-qualified name of a registered type
//! - Tag: caller-assigned numeric wire identifier for a registered type
//! - Ordinal: per-call identifier for one object identity

use std::fmt;
use std::sync::Arc;

/// Numeric wire tag identifying a registered type.
///
/// Tags are part of the on-wire format and MUST stay constant across
/// versions of the application that must read each other's data. They are
/// caller-assigned (or assigned in registration order) and unique within one
/// registry.
pub type Tag = u32;

/// Per-call ordinal assigned to one object identity.
///
/// Ordinals are assigned in first-encounter order during a depth-first walk
/// and are only meaningful within a single encode or decode call.
pub type Ordinal = u64;

/// Stable fully-qualified name of a registered type.
///
/// A TypeKey is the registry's notion of "runtime type": a cheap-to-clone
/// interned string such as `"todo.item"` or `"arkiv.journal.entry"`. Keys
/// double as the self-describing frame header for untyped streams, so they
/// should be chosen as carefully as tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(Arc<str>);

impl TypeKey {
    /// Create a key from a name.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl From<&TypeKey> for TypeKey {
    fn from(key: &TypeKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current time as microseconds since the Unix epoch.
pub fn now_micros() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_key_equality_and_display() {
        let a = TypeKey::new("todo.item");
        let b = TypeKey::from("todo.item");
        let c = TypeKey::from("todo.category");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "todo.item");
        assert_eq!(a.as_str(), "todo.item");
    }

    #[test]
    fn test_type_key_cheap_clone() {
        let a = TypeKey::new("todo.item");
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_now_micros_is_monotonic_enough() {
        let a = now_micros();
        let b = now_micros();
        assert!(b >= a);
        // Sanity: after 2020, before 2100.
        assert!(a > 1_577_836_800_000_000);
        assert!(a < 4_102_444_800_000_000);
    }
}
