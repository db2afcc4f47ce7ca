//! Arkiv — pluggable binary codec for in-process object persistence
//!
//! Arkiv converts arbitrary, possibly cyclic, possibly polymorphic object
//! graphs into a compact binary representation and back, preserving object
//! identity and integrating with three persistence usages: full-model
//! snapshots, an append-only command journal, and ephemeral result cloning.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use arkiv::{FieldKind, ProfileConfigurator, TypeRegistry, Value};
//!
//! // Configuration phase: declare types, tags and layouts.
//! let registry = TypeRegistry::new();
//! registry.register_with_tag("todo.item", 1)?;
//! registry.register_field("todo.item", 1, "title", FieldKind::Str)?;
//!
//! // Bind a usage profile and move bytes.
//! let snapshots = ProfileConfigurator::new(Arc::new(registry)).snapshot("todo.item")?;
//! let mut stream = Vec::new();
//! snapshots.write(&mut stream, &Value::object("todo.item", vec![Value::str("Eat")]))?;
//! let back = snapshots.read(&mut stream.as_slice())?;
//! assert_eq!(
//!     back.as_object().unwrap().borrow().field(0).unwrap().as_str(),
//!     Some("Eat"),
//! );
//! # Ok::<(), arkiv::WireError>(())
//! ```

// Re-export the public API from the member crates
pub use arkiv_codec::*;
pub use arkiv_core::*;
