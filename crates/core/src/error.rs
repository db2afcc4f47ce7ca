//! Error types for the wire layer
//!
//! Three concerns, three enums, composed into [`WireError`]:
//!
//! - [`RegistrationError`]: configuration-time failures. Fatal to setup;
//!   the profile must not be used afterwards.
//! - [`DispatchError`]: encode/decode-time failures meaning a graph holds a
//!   type or shape the registry does not know. Never retried.
//! - [`FramingError`]: a corrupted or truncated stream, or a reader/writer
//!   configuration mismatch. Never retried (a retry would reread the same
//!   bytes).
//!
//! No error is swallowed or defaulted; every failure aborts the current
//! call and partial output is discarded.

use std::io;
use thiserror::Error;

use crate::types::{Ordinal, Tag, TypeKey};

/// Result type alias for wire-layer operations
pub type Result<T> = std::result::Result<T, WireError>;

/// Configuration-time registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// An explicit tag is already bound to a different type.
    #[error("tag {tag} is already bound to {existing}, cannot register {incoming}")]
    TagCollision {
        /// The contested tag
        tag: Tag,
        /// Type currently holding the tag
        existing: TypeKey,
        /// Type that attempted to claim it
        incoming: TypeKey,
    },

    /// `register_subtype` named a base type that was never registered.
    #[error("unknown base type: {base}")]
    UnknownBaseType {
        /// The missing base type
        base: TypeKey,
    },

    /// Two different fields declared the same wire position on one type.
    #[error("duplicate field position {position} on {type_key}")]
    DuplicatePosition {
        /// Type whose layout is being declared
        type_key: TypeKey,
        /// The contested position
        position: u16,
    },

    /// A type already subtyped under one base was re-registered under
    /// another. The hierarchy is a tree; a type has at most one base.
    #[error("{derived} is already a subtype of {current_base}, cannot rebase under {base}")]
    RebasedType {
        /// The derived type
        derived: TypeKey,
        /// Its existing base
        current_base: TypeKey,
        /// The conflicting new base
        base: TypeKey,
    },

    /// Declaring this subtype edge would make a type its own ancestor.
    #[error("registering {derived} under {base} would create a hierarchy cycle")]
    HierarchyCycle {
        /// The proposed base
        base: TypeKey,
        /// The proposed derived type
        derived: TypeKey,
    },

    /// A profile was requested without the configuration it needs.
    #[error("profile {profile} is missing required configuration: {missing}")]
    ProfileUnconfigured {
        /// Profile name
        profile: String,
        /// What was missing
        missing: String,
    },
}

/// Encode/decode-time dispatch failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Encode met an object whose concrete type was never registered.
    /// There is no fallback: every concrete type in a graph must be
    /// pre-registered, directly or via a declared subtype chain.
    #[error("type not registered: {type_key}")]
    UnregisteredType {
        /// The unregistered type
        type_key: TypeKey,
    },

    /// Decode read a tag with no type registered under it for this base.
    #[error("no type registered under tag {tag} for base {base}")]
    UnknownTag {
        /// Declared base of the slot being decoded
        base: TypeKey,
        /// The unresolvable tag
        tag: Tag,
    },

    /// Encode met an object in a slot whose declared base is not one of the
    /// object's registered ancestors.
    #[error("{concrete} is not a registered subtype of {base}")]
    NotASubtype {
        /// Declared base of the slot
        base: TypeKey,
        /// Concrete type of the offending object
        concrete: TypeKey,
    },

    /// A field value's shape does not match its declared kind.
    #[error("field `{field}` of {type_key}: declared {expected}, found {found}")]
    FieldMismatch {
        /// Type owning the field
        type_key: TypeKey,
        /// Declared field name
        field: String,
        /// Declared kind
        expected: String,
        /// Kind of the value actually present
        found: String,
    },

    /// An instance carries a different number of fields than its effective
    /// layout declares.
    #[error("instance of {type_key} carries {found} fields, layout declares {expected}")]
    FieldCount {
        /// Type whose layout was violated
        type_key: TypeKey,
        /// Declared field count
        expected: usize,
        /// Fields actually present
        found: usize,
    },
}

/// Stream-level failures: corruption, truncation, or a reader configured
/// differently from the writer that produced the stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    /// The stream ended in the middle of a frame or payload.
    #[error("truncated stream: needed {needed} more bytes, had {have}")]
    TruncatedStream {
        /// Bytes the decoder still needed
        needed: usize,
        /// Bytes that were actually available
        have: usize,
    },

    /// A self-describing frame carried a type name the registry does not
    /// know.
    #[error("cannot resolve type name read from stream: {name}")]
    UnresolvableTypeName {
        /// The unresolvable name
        name: String,
    },

    /// A back-reference named an ordinal that was never bound. Either the
    /// stream is corrupt or writer and reader disagree on traversal order.
    #[error("back-reference to unbound ordinal {ordinal}")]
    DanglingReference {
        /// The unbound ordinal
        ordinal: Ordinal,
    },

    /// The payload bytes are structurally invalid (bad bool byte, invalid
    /// UTF-8, varint overflow, trailing garbage).
    #[error("corrupt payload: {0}")]
    Corruption(String),
}

/// Top-level error for all wire-layer operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// Configuration-time registration failure
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Encode/decode-time dispatch failure
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Corrupted/truncated stream or framing configuration mismatch
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// I/O error from the caller-owned stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_collision_display() {
        let err = RegistrationError::TagCollision {
            tag: 7,
            existing: TypeKey::new("todo.item"),
            incoming: TypeKey::new("todo.category"),
        };
        let msg = err.to_string();
        assert!(msg.contains('7'));
        assert!(msg.contains("todo.item"));
        assert!(msg.contains("todo.category"));
    }

    #[test]
    fn test_dispatch_display() {
        let err = DispatchError::UnknownTag {
            base: TypeKey::new("shape"),
            tag: 42,
        };
        let msg = err.to_string();
        assert!(msg.contains("shape"));
        assert!(msg.contains("42"));

        let err = DispatchError::FieldMismatch {
            type_key: TypeKey::new("todo.item"),
            field: "title".to_string(),
            expected: "Str".to_string(),
            found: "UInt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("title"));
        assert!(msg.contains("Str"));
        assert!(msg.contains("UInt"));
    }

    #[test]
    fn test_framing_display() {
        let err = FramingError::TruncatedStream { needed: 8, have: 3 };
        let msg = err.to_string();
        assert!(msg.contains('8'));
        assert!(msg.contains('3'));

        let err = FramingError::DanglingReference { ordinal: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_wire_error_from_conversions() {
        let err: WireError = RegistrationError::UnknownBaseType {
            base: TypeKey::new("shape"),
        }
        .into();
        assert!(matches!(err, WireError::Registration(_)));

        let err: WireError = FramingError::Corruption("bad byte".to_string()).into();
        assert!(matches!(err, WireError::Framing(_)));

        let err: WireError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, WireError::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn ok() -> Result<u32> {
            Ok(1)
        }
        fn fails() -> Result<u32> {
            Err(FramingError::Corruption("test".to_string()).into())
        }

        assert_eq!(ok().unwrap(), 1);
        assert!(fails().is_err());
    }
}
