//! Core types for Arkiv
//!
//! This crate defines the foundational types used throughout the wire layer:
//! - TypeKey / Tag / Ordinal: stable identifiers for registered types and
//!   per-call object ordinals
//! - Value / Instance / ObjRef: the dynamic object-graph model the codec
//!   walks
//! - Error: the error taxonomy (registration / dispatch / framing)
//! - JournalEntry: the journal-entry envelope consumed by the host engine
//! - Formatter: the capability contract the host calls for each persistence
//!   usage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod formatter;
pub mod journal;
pub mod types;
pub mod value;

pub use error::{DispatchError, FramingError, RegistrationError, Result, WireError};
pub use formatter::{Formatter, FormatterUsage};
pub use journal::{EntryPayload, JournalEntry};
pub use types::{now_micros, Ordinal, Tag, TypeKey};
pub use value::{Instance, ObjRef, Value};
