//! Per-call reference tables
//!
//! One table lives for exactly one encode or decode call, created at the
//! start and discarded at the end, never shared across calls. This keeps
//! the hot path free of locks: concurrency lives in the registry, identity
//! lives here.
//!
//! Ordinals are assigned in first-encounter order of the depth-first walk.
//! The decoder binds ordinals in the same order the encoder assigned them,
//! so out-of-order binding means the stream and the traversal disagree.

use std::collections::HashMap;
use std::rc::Rc;

use arkiv_core::error::FramingError;
use arkiv_core::types::Ordinal;
use arkiv_core::value::ObjRef;

/// Encode-side table: object identity -> ordinal.
#[derive(Default)]
pub struct EncodeRefs {
    ordinals: HashMap<usize, Ordinal>,
}

impl EncodeRefs {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal for this identity, assigning the next one on first
    /// encounter. Returns `(ordinal, is_first_occurrence)`.
    pub fn get_or_assign(&mut self, obj: &ObjRef) -> (Ordinal, bool) {
        let identity = Rc::as_ptr(obj) as usize;
        let next = self.ordinals.len() as Ordinal;
        match self.ordinals.entry(identity) {
            std::collections::hash_map::Entry::Occupied(e) => (*e.get(), false),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(next);
                (next, true)
            }
        }
    }

    /// Distinct identities seen so far.
    pub fn len(&self) -> usize {
        self.ordinals.len()
    }

    /// True if no identity has been seen.
    pub fn is_empty(&self) -> bool {
        self.ordinals.is_empty()
    }
}

/// Decode-side table: ordinal -> materialized instance.
#[derive(Default)]
pub struct DecodeRefs {
    instances: Vec<ObjRef>,
}

impl DecodeRefs {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordinal the next fresh object will bind to.
    pub fn next_ordinal(&self) -> Ordinal {
        self.instances.len() as Ordinal
    }

    /// Bind `ordinal` to a freshly constructed instance. Ordinals must
    /// arrive in first-occurrence order; anything else means the stream was
    /// not produced by the mirrored depth-first walk.
    pub fn bind(&mut self, ordinal: Ordinal, instance: ObjRef) -> Result<(), FramingError> {
        if ordinal != self.next_ordinal() {
            return Err(FramingError::Corruption(format!(
                "out-of-order ordinal binding: got {ordinal}, expected {}",
                self.next_ordinal()
            )));
        }
        self.instances.push(instance);
        Ok(())
    }

    /// Instance previously bound at `ordinal`, if any.
    pub fn lookup(&self, ordinal: Ordinal) -> Option<ObjRef> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.instances.get(i))
            .map(Rc::clone)
    }
}
