//! Journal-entry boundary types
//!
//! The host engine's journal is an append-only stream of entries, each
//! carrying a sequence number, a creation timestamp and one of three
//! payloads: a command to replay, a rollback marker, or a model-created
//! marker naming the model type the journal belongs to.
//!
//! These are plain data types; their wire form lives in the codec crate's
//! journal profile.

use crate::types::{now_micros, TypeKey};
use crate::value::ObjRef;

/// One entry in the command journal.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// Sequence number, assigned by the host's journal writer.
    pub id: u64,
    /// Creation time, microseconds since the Unix epoch.
    pub created: u64,
    /// What this entry records.
    pub payload: EntryPayload,
}

/// Payload of one journal entry.
#[derive(Debug, Clone)]
pub enum EntryPayload {
    /// A command object to replay against the model. Its concrete type must
    /// be registered as a command subtype with a caller-stable tag.
    Command(ObjRef),
    /// The preceding command was rolled back and must not be replayed.
    Rollback,
    /// The journal's model was created; names the model type.
    ModelCreated(TypeKey),
}

impl JournalEntry {
    /// Entry recording a command, stamped with the current time.
    pub fn command(id: u64, command: ObjRef) -> Self {
        Self {
            id,
            created: now_micros(),
            payload: EntryPayload::Command(command),
        }
    }

    /// Entry recording a rollback marker, stamped with the current time.
    pub fn rollback(id: u64) -> Self {
        Self {
            id,
            created: now_micros(),
            payload: EntryPayload::Rollback,
        }
    }

    /// Entry recording model creation, stamped with the current time.
    pub fn model_created(id: u64, model: impl Into<TypeKey>) -> Self {
        Self {
            id,
            created: now_micros(),
            payload: EntryPayload::ModelCreated(model.into()),
        }
    }

    /// Replace the creation timestamp (for replay and tests).
    pub fn with_created(mut self, created: u64) -> Self {
        self.created = created;
        self
    }
}
