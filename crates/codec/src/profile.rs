//! Persistence profiles: Snapshot, Journal, ResultClone
//!
//! One registry, one graph codec, three usages with different framing and
//! registration needs:
//!
//! - **Snapshot**: formatter fixed to one model type. No type name (the
//!   type is known structurally), no length prefix (the snapshot is the
//!   sole content of its stream).
//! - **Journal**: root type is the journal-entry envelope; caller commands
//!   are layered as subtypes with caller-stable tags over the
//!   framework-reserved set. Length prefix on so many entries share one
//!   stream and stay independently skippable; no type name (the envelope's
//!   subtype tag already discriminates).
//! - **ResultClone**: generic self-describing formatter (type name +
//!   length prefix) used to deep-copy a result value so it shares no
//!   references with the original.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info};

use arkiv_core::error::{FramingError, RegistrationError, Result};
use arkiv_core::formatter::{Formatter, FormatterUsage};
use arkiv_core::journal::{EntryPayload, JournalEntry};
use arkiv_core::types::{Tag, TypeKey};
use arkiv_core::value::{Instance, Value};

use crate::framing::StreamFramer;
use crate::graph::GraphCodec;
use crate::registry::{FieldKind, TypeRegistry};

/// The three persistence usages and their framing defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Full-model snapshot: typed, unframed.
    Snapshot,
    /// Append-only command journal: length-prefixed entries.
    Journal,
    /// Generic result cloning: self-describing, length-prefixed.
    ResultClone,
}

impl Profile {
    /// Framer flags this profile writes and reads with.
    pub fn framer(&self) -> StreamFramer {
        match self {
            Profile::Snapshot => StreamFramer::new(false, false),
            Profile::Journal => StreamFramer::new(false, true),
            Profile::ResultClone => StreamFramer::new(true, true),
        }
    }
}

/// Framework-reserved type keys and wire tags.
///
/// Registered before any caller command types; a caller tag colliding with
/// this range is a configuration error surfaced as `TagCollision`.
pub mod reserved {
    use arkiv_core::types::Tag;

    /// Journal entry envelope (abstract base).
    pub const ENTRY: &str = "arkiv.journal.entry";
    /// Entry carrying a command.
    pub const ENTRY_COMMAND: &str = "arkiv.journal.entry.command";
    /// Entry carrying a rollback marker.
    pub const ENTRY_ROLLBACK: &str = "arkiv.journal.entry.rollback";
    /// Entry recording model creation.
    pub const ENTRY_MODEL_CREATED: &str = "arkiv.journal.entry.model_created";
    /// Abstract base of all caller command types.
    pub const COMMAND: &str = "arkiv.journal.command";

    /// Tag of [`ENTRY`].
    pub const TAG_ENTRY: Tag = 0xF0;
    /// Tag of [`ENTRY_COMMAND`].
    pub const TAG_ENTRY_COMMAND: Tag = 0xF1;
    /// Tag of [`ENTRY_ROLLBACK`].
    pub const TAG_ENTRY_ROLLBACK: Tag = 0xF2;
    /// Tag of [`ENTRY_MODEL_CREATED`].
    pub const TAG_ENTRY_MODEL_CREATED: Tag = 0xF3;
    /// Tag of [`COMMAND`].
    pub const TAG_COMMAND: Tag = 0xF4;
}

/// Register the framework's journal types. Safe to call repeatedly.
pub fn register_framework_types(registry: &TypeRegistry) -> Result<()> {
    registry.register_with_tag(reserved::ENTRY, reserved::TAG_ENTRY)?;
    registry.register_field(reserved::ENTRY, 1, "id", FieldKind::UInt)?;
    registry.register_field(reserved::ENTRY, 2, "created", FieldKind::UInt)?;

    registry.register_with_tag(reserved::COMMAND, reserved::TAG_COMMAND)?;

    registry.register_subtype(
        reserved::ENTRY,
        reserved::TAG_ENTRY_COMMAND,
        reserved::ENTRY_COMMAND,
    )?;
    registry.register_field(
        reserved::ENTRY_COMMAND,
        1,
        "command",
        FieldKind::object(reserved::COMMAND),
    )?;

    registry.register_subtype(
        reserved::ENTRY,
        reserved::TAG_ENTRY_ROLLBACK,
        reserved::ENTRY_ROLLBACK,
    )?;

    registry.register_subtype(
        reserved::ENTRY,
        reserved::TAG_ENTRY_MODEL_CREATED,
        reserved::ENTRY_MODEL_CREATED,
    )?;
    registry.register_field(reserved::ENTRY_MODEL_CREATED, 1, "model", FieldKind::Str)?;

    Ok(())
}

/// Assembles formatters for the three persistence usages over one shared
/// registry.
pub struct ProfileConfigurator {
    registry: Arc<TypeRegistry>,
    snapshot_model: Option<TypeKey>,
    command_tags: BTreeMap<TypeKey, Tag>,
}

impl ProfileConfigurator {
    /// Create a configurator over a registry.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            snapshot_model: None,
            command_tags: BTreeMap::new(),
        }
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Set the model type the snapshot formatter is fixed to.
    pub fn with_snapshot_model(mut self, model: impl Into<TypeKey>) -> Self {
        self.snapshot_model = Some(model.into());
        self
    }

    /// Set the caller's `{command type -> tag}` map. Tags must stay
    /// constant across versions that must read each other's journals.
    pub fn with_command_tags(mut self, tags: BTreeMap<TypeKey, Tag>) -> Self {
        self.command_tags = tags;
        self
    }

    /// Formatter for one usage, as the host's per-usage factory calls it.
    pub fn formatter(&self, usage: FormatterUsage) -> Result<Box<dyn Formatter>> {
        match usage {
            FormatterUsage::Snapshot => {
                let model = self.snapshot_model.clone().ok_or_else(|| {
                    RegistrationError::ProfileUnconfigured {
                        profile: "Snapshot".to_string(),
                        missing: "snapshot model type".to_string(),
                    }
                })?;
                Ok(Box::new(self.snapshot(model)?))
            }
            FormatterUsage::Journal => Ok(Box::new(self.journal(&self.command_tags)?)),
            FormatterUsage::Results => Ok(Box::new(self.result_clone())),
        }
    }

    /// Typed snapshot formatter fixed to `model`.
    ///
    /// The model type must already be registered; there is nothing on the
    /// wire to recover it from.
    pub fn snapshot(&self, model: impl Into<TypeKey>) -> Result<SnapshotFormatter> {
        let model = model.into();
        self.registry.resolve(&model)?;
        info!(model = %model, "configured snapshot profile");
        Ok(SnapshotFormatter {
            codec: GraphCodec::new(Arc::clone(&self.registry)),
            model,
        })
    }

    /// Journal profile: registers framework types, then the caller's
    /// command subtypes under their caller-stable tags.
    pub fn journal(&self, command_tags: &BTreeMap<TypeKey, Tag>) -> Result<JournalProfile> {
        register_framework_types(&self.registry)?;
        for (key, tag) in command_tags {
            self.registry
                .register_subtype(reserved::COMMAND, *tag, key.clone())?;
        }
        info!(commands = command_tags.len(), "configured journal profile");
        Ok(JournalProfile {
            codec: GraphCodec::new(Arc::clone(&self.registry)),
        })
    }

    /// Generic self-describing cloner for result isolation.
    pub fn result_clone(&self) -> ResultCloner {
        info!("configured result-clone profile");
        ResultCloner {
            codec: GraphCodec::new(Arc::clone(&self.registry)),
        }
    }
}

/// Snapshot formatter: typed, unframed, one graph per stream.
pub struct SnapshotFormatter {
    codec: GraphCodec,
    model: TypeKey,
}

impl SnapshotFormatter {
    /// The model type this formatter reads and writes.
    pub fn model(&self) -> &TypeKey {
        &self.model
    }

    /// Write the model graph as the stream's sole content.
    pub fn write(&self, stream: &mut dyn Write, model: &Value) -> Result<()> {
        let payload = self.codec.encode(model, &self.model)?;
        Profile::Snapshot.framer().write(stream, None, &payload)
    }

    /// Read the model graph back.
    pub fn read(&self, stream: &mut dyn Read) -> Result<Value> {
        match Profile::Snapshot.framer().read(stream)? {
            Some(frame) => self.codec.decode(&frame.payload, &self.model),
            None => Err(FramingError::TruncatedStream { needed: 1, have: 0 }.into()),
        }
    }
}

impl Formatter for SnapshotFormatter {
    fn serialize(&self, stream: &mut dyn Write, value: &Value) -> Result<()> {
        self.write(stream, value)
    }

    fn deserialize(&self, stream: &mut dyn Read) -> Result<Value> {
        self.read(stream)
    }
}

/// Journal profile: entry envelopes over a shared length-prefixed stream.
pub struct JournalProfile {
    codec: GraphCodec,
}

impl JournalProfile {
    /// Writer appending entries to `stream`.
    pub fn writer<W: Write>(&self, stream: W) -> JournalWriter<W> {
        JournalWriter {
            codec: self.codec.clone(),
            framer: Profile::Journal.framer(),
            stream,
            entries_written: 0,
        }
    }

    /// Reader iterating entries from `stream`.
    pub fn reader<R: Read>(&self, stream: R) -> JournalReader<R> {
        JournalReader {
            codec: self.codec.clone(),
            framer: Profile::Journal.framer(),
            stream,
        }
    }

    fn entry_root() -> TypeKey {
        TypeKey::new(reserved::ENTRY)
    }
}

impl Formatter for JournalProfile {
    fn serialize(&self, stream: &mut dyn Write, value: &Value) -> Result<()> {
        let payload = self.codec.encode(value, &Self::entry_root())?;
        Profile::Journal.framer().write(stream, None, &payload)
    }

    fn deserialize(&self, stream: &mut dyn Read) -> Result<Value> {
        match Profile::Journal.framer().read(stream)? {
            Some(frame) => self.codec.decode(&frame.payload, &Self::entry_root()),
            None => Err(FramingError::TruncatedStream { needed: 1, have: 0 }.into()),
        }
    }
}

/// Append-side of the journal stream.
pub struct JournalWriter<W: Write> {
    codec: GraphCodec,
    framer: StreamFramer,
    stream: W,
    entries_written: u64,
}

impl<W: Write> JournalWriter<W> {
    /// Append one entry as one length-prefixed frame.
    pub fn append(&mut self, entry: &JournalEntry) -> Result<()> {
        let value = entry_to_value(entry);
        let payload = self.codec.encode(&value, &JournalProfile::entry_root())?;
        self.framer.write(&mut self.stream, None, &payload)?;
        self.entries_written += 1;
        debug!(id = entry.id, bytes = payload.len(), "journal entry appended");
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.stream.flush()?;
        Ok(())
    }

    /// Entries appended through this writer.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Give the stream back to the caller.
    pub fn into_inner(self) -> W {
        self.stream
    }
}

/// Read-side of the journal stream.
///
/// Each frame is consumed in full before its payload is decoded, so a
/// decode failure inside one entry leaves the stream positioned at the next
/// frame: callers may keep iterating past a bad entry where the host
/// decides that is safe.
pub struct JournalReader<R: Read> {
    codec: GraphCodec,
    framer: StreamFramer,
    stream: R,
}

impl<R: Read> JournalReader<R> {
    /// Read the next entry; `Ok(None)` at clean end of stream.
    pub fn read_entry(&mut self) -> Result<Option<JournalEntry>> {
        match self.framer.read(&mut self.stream)? {
            None => Ok(None),
            Some(frame) => {
                let value = self
                    .codec
                    .decode(&frame.payload, &JournalProfile::entry_root())?;
                Ok(Some(entry_from_value(&value)?))
            }
        }
    }
}

impl<R: Read> Iterator for JournalReader<R> {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry().transpose()
    }
}

/// Generic self-describing formatter used to deep-copy result values.
pub struct ResultCloner {
    codec: GraphCodec,
}

impl ResultCloner {
    /// Write one object-rooted value as a self-describing frame.
    pub fn write(&self, stream: &mut dyn Write, value: &Value) -> Result<()> {
        let declared = match value.as_object() {
            Some(obj) => obj.borrow().type_key.clone(),
            None => {
                return Err(FramingError::Corruption(format!(
                    "result cloning requires an object root, found {}",
                    value.kind_name()
                ))
                .into());
            }
        };
        let payload = self.codec.encode(value, &declared)?;
        Profile::ResultClone
            .framer()
            .write(stream, Some(declared.as_str()), &payload)
    }

    /// Read one value back, resolving its root type from the frame header.
    pub fn read(&self, stream: &mut dyn Read) -> Result<Value> {
        let frame = match Profile::ResultClone.framer().read(stream)? {
            Some(frame) => frame,
            None => return Err(FramingError::TruncatedStream { needed: 1, have: 0 }.into()),
        };
        let name = frame.type_name.ok_or_else(|| {
            FramingError::Corruption("self-describing frame carried no type name".to_string())
        })?;
        let key = TypeKey::new(&name);
        if !self.codec.registry().contains(&key) {
            return Err(FramingError::UnresolvableTypeName { name }.into());
        }
        self.codec.decode(&frame.payload, &key)
    }

    /// Deep-copy a value through the wire: the clone shares no references
    /// with the original.
    pub fn clone_value(&self, value: &Value) -> Result<Value> {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        self.read(&mut buf.as_slice())
    }
}

impl Formatter for ResultCloner {
    fn serialize(&self, stream: &mut dyn Write, value: &Value) -> Result<()> {
        self.write(stream, value)
    }

    fn deserialize(&self, stream: &mut dyn Read) -> Result<Value> {
        self.read(stream)
    }
}

fn entry_to_value(entry: &JournalEntry) -> Value {
    let header = [Value::UInt(entry.id), Value::UInt(entry.created)];
    match &entry.payload {
        EntryPayload::Command(command) => Value::object(
            reserved::ENTRY_COMMAND,
            header
                .into_iter()
                .chain([Value::Object(Rc::clone(command))])
                .collect(),
        ),
        EntryPayload::Rollback => Value::object(reserved::ENTRY_ROLLBACK, header.to_vec()),
        EntryPayload::ModelCreated(model) => Value::object(
            reserved::ENTRY_MODEL_CREATED,
            header
                .into_iter()
                .chain([Value::str(model.as_str())])
                .collect(),
        ),
    }
}

fn entry_from_value(value: &Value) -> Result<JournalEntry> {
    let malformed = |what: &str| FramingError::Corruption(format!("malformed journal entry: {what}"));

    let obj = value
        .as_object()
        .ok_or_else(|| malformed("root is not an object"))?;
    let instance: std::cell::Ref<'_, Instance> = obj.borrow();

    let id = instance
        .field(0)
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("missing id"))?;
    let created = instance
        .field(1)
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("missing created"))?;

    let payload = match instance.type_key.as_str() {
        reserved::ENTRY_COMMAND => {
            let command = instance
                .field(2)
                .and_then(Value::as_object)
                .ok_or_else(|| malformed("missing command object"))?;
            EntryPayload::Command(Rc::clone(command))
        }
        reserved::ENTRY_ROLLBACK => EntryPayload::Rollback,
        reserved::ENTRY_MODEL_CREATED => {
            let model = instance
                .field(2)
                .and_then(Value::as_str)
                .ok_or_else(|| malformed("missing model name"))?;
            EntryPayload::ModelCreated(TypeKey::new(model))
        }
        other => {
            return Err(malformed(&format!("unexpected entry type {other}")).into());
        }
    };

    Ok(JournalEntry {
        id,
        created,
        payload,
    })
}
