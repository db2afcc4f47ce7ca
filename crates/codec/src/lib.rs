//! Codec engine for Arkiv
//!
//! This crate turns object graphs into bytes and back:
//!
//! - Type registry: stable wire tags, declared field layouts, hierarchical
//!   (base/derived) registration extensible at runtime
//! - Reference tables: per-call identity bookkeeping so shared and cyclic
//!   references survive the round trip
//! - Graph codec: depth-first encode/decode with tag-driven polymorphic
//!   dispatch
//! - Stream framer: optional type-name header and length prefix so frames
//!   can share one stream
//! - Profiles: Snapshot, Journal and ResultClone wiring, plus journal
//!   writer/reader helpers

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod framing;
pub mod graph;
pub mod profile;
pub mod refs;
pub mod registry;
pub mod wire;

pub use framing::{Frame, StreamFramer};
pub use graph::GraphCodec;
pub use profile::{
    register_framework_types, reserved, JournalProfile, JournalReader, JournalWriter, Profile,
    ProfileConfigurator, ResultCloner, SnapshotFormatter,
};
pub use refs::{DecodeRefs, EncodeRefs};
pub use registry::{FieldDef, FieldKind, TypeDescriptor, TypeRegistry};
