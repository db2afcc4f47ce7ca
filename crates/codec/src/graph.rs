//! Graph codec: depth-first encode/decode of object graphs
//!
//! The encoder walks the graph in depth-first pre-order. Before writing any
//! object it consults the reference table: a first encounter writes a fresh
//! marker, the concrete type's tag and the fields in effective-layout
//! order; a repeat encounter writes only a back-reference to the object's
//! ordinal. The decoder mirrors the walk exactly, binding each fresh
//! object's ordinal before reading its fields so cyclic graphs
//! reconstruct.
//!
//! ## Object slot wire form
//!
//! ```text
//! [marker: varint]           0 = fresh object, n > 0 = back-reference to ordinal n-1
//! [tag: varint]              fresh only: concrete type's registry tag
//! [fields...]                fresh only: effective layout, base fields first
//! ```
//!
//! Payloads are built in memory and decoded from byte slices; stream I/O
//! is the framer's job.

use std::rc::Rc;
use std::sync::Arc;

use tracing::trace;

use arkiv_core::error::{DispatchError, FramingError, Result};
use arkiv_core::types::{Tag, TypeKey};
use arkiv_core::value::{Instance, ObjRef, Value};

use crate::refs::{DecodeRefs, EncodeRefs};
use crate::registry::{FieldKind, RegistryInner, TypeRegistry};
use crate::wire::{self, PayloadCursor};

/// Encode/decode engine for one registry.
///
/// Cheap to clone; all per-call state lives on the stack of each call.
#[derive(Clone)]
pub struct GraphCodec {
    registry: Arc<TypeRegistry>,
}

impl GraphCodec {
    /// Create a codec over a configured registry.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this codec dispatches through.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Encode one graph rooted at an object of (a registered descendant of)
    /// `declared`.
    pub fn encode(&self, root: &Value, declared: &TypeKey) -> Result<Vec<u8>> {
        let types = self.registry.snapshot();
        let mut encoder = Encoder {
            types: &types,
            refs: EncodeRefs::new(),
            out: Vec::new(),
        };
        match root {
            Value::Object(obj) => encoder.encode_object(obj, declared)?,
            other => {
                return Err(DispatchError::FieldMismatch {
                    type_key: declared.clone(),
                    field: "(root)".to_string(),
                    expected: "Object".to_string(),
                    found: other.kind_name().to_string(),
                }
                .into());
            }
        }
        trace!(
            root = %declared,
            objects = encoder.refs.len(),
            bytes = encoder.out.len(),
            "encoded graph"
        );
        Ok(encoder.out)
    }

    /// Decode one graph from a payload produced by [`encode`] with the same
    /// declared root.
    ///
    /// [`encode`]: GraphCodec::encode
    pub fn decode(&self, payload: &[u8], declared: &TypeKey) -> Result<Value> {
        let types = self.registry.snapshot();
        let mut decoder = Decoder {
            types: &types,
            refs: DecodeRefs::new(),
            cursor: PayloadCursor::new(payload),
        };
        let root = decoder.decode_object(declared)?;
        if !decoder.cursor.is_empty() {
            return Err(FramingError::Corruption(format!(
                "{} trailing bytes after root object",
                decoder.cursor.remaining()
            ))
            .into());
        }
        trace!(root = %declared, bytes = payload.len(), "decoded graph");
        Ok(root)
    }
}

struct Encoder<'a> {
    types: &'a RegistryInner,
    refs: EncodeRefs,
    out: Vec<u8>,
}

impl<'a> Encoder<'a> {
    fn encode_object(&mut self, obj: &ObjRef, declared: &TypeKey) -> Result<()> {
        let (ordinal, first) = self.refs.get_or_assign(obj);
        if !first {
            wire::put_uvarint(&mut self.out, ordinal + 1);
            return Ok(());
        }
        wire::put_uvarint(&mut self.out, 0);

        let instance = obj.borrow();
        let types = self.types;
        let desc = types.get(&instance.type_key)?;
        if instance.type_key != *declared && !types.is_descendant(&instance.type_key, declared) {
            return Err(DispatchError::NotASubtype {
                base: declared.clone(),
                concrete: instance.type_key.clone(),
            }
            .into());
        }
        wire::put_uvarint(&mut self.out, u64::from(desc.tag));

        let layout = types.effective_fields(desc);
        if layout.len() != instance.fields.len() {
            return Err(DispatchError::FieldCount {
                type_key: instance.type_key.clone(),
                expected: layout.len(),
                found: instance.fields.len(),
            }
            .into());
        }
        for (def, value) in layout.iter().zip(&instance.fields) {
            self.encode_value(value, &def.kind, &instance.type_key, &def.name)?;
        }
        Ok(())
    }

    fn encode_value(
        &mut self,
        value: &Value,
        kind: &FieldKind,
        owner: &TypeKey,
        field: &str,
    ) -> Result<()> {
        match (kind, value) {
            (FieldKind::Bool, Value::Bool(b)) => self.out.push(u8::from(*b)),
            (FieldKind::Int, Value::Int(i)) => wire::put_ivarint(&mut self.out, *i),
            (FieldKind::UInt, Value::UInt(u)) => wire::put_uvarint(&mut self.out, *u),
            (FieldKind::Float, Value::Float(x)) => self.out.extend_from_slice(&x.to_le_bytes()),
            (FieldKind::Str, Value::Str(s)) => wire::put_str(&mut self.out, s),
            (FieldKind::Bytes, Value::Bytes(b)) => wire::put_bytes(&mut self.out, b),
            (FieldKind::Optional(_), Value::Null) => self.out.push(0),
            (FieldKind::Optional(inner), present) => {
                self.out.push(1);
                self.encode_value(present, inner, owner, field)?;
            }
            (FieldKind::List(elem), Value::List(items)) => {
                wire::put_uvarint(&mut self.out, items.len() as u64);
                for item in items {
                    self.encode_value(item, elem, owner, field)?;
                }
            }
            (FieldKind::Map(key_kind, value_kind), Value::Map(pairs)) => {
                wire::put_uvarint(&mut self.out, pairs.len() as u64);
                for (key, value) in pairs {
                    self.encode_value(key, key_kind, owner, field)?;
                    self.encode_value(value, value_kind, owner, field)?;
                }
            }
            (FieldKind::Object(base), Value::Object(obj)) => self.encode_object(obj, base)?,
            (kind, value) => {
                return Err(DispatchError::FieldMismatch {
                    type_key: owner.clone(),
                    field: field.to_string(),
                    expected: kind.to_string(),
                    found: value.kind_name().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

struct Decoder<'a> {
    types: &'a RegistryInner,
    refs: DecodeRefs,
    cursor: PayloadCursor<'a>,
}

impl<'a> Decoder<'a> {
    fn decode_object(&mut self, declared: &TypeKey) -> Result<Value> {
        let marker = self.cursor.uvarint()?;
        if marker > 0 {
            let ordinal = marker - 1;
            let obj = self
                .refs
                .lookup(ordinal)
                .ok_or(FramingError::DanglingReference { ordinal })?;
            return Ok(Value::Object(obj));
        }

        let raw_tag = self.cursor.uvarint()?;
        let tag = Tag::try_from(raw_tag).map_err(|_| {
            FramingError::Corruption(format!("type tag {raw_tag} out of range"))
        })?;
        let types = self.types;
        let desc = types.get_by_tag(declared, tag)?;
        let layout = types.effective_fields(desc);

        // Bind before reading fields so back-references inside the fields
        // (including cycles through this object) resolve.
        let obj: ObjRef = Instance::new(desc.key.clone(), Vec::with_capacity(layout.len())).shared();
        let ordinal = self.refs.next_ordinal();
        self.refs.bind(ordinal, Rc::clone(&obj))?;

        for def in layout {
            let value = self.decode_value(&def.kind)?;
            obj.borrow_mut().fields.push(value);
        }
        Ok(Value::Object(obj))
    }

    fn decode_value(&mut self, kind: &FieldKind) -> Result<Value> {
        Ok(match kind {
            FieldKind::Bool => match self.cursor.u8()? {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => {
                    return Err(
                        FramingError::Corruption(format!("invalid bool byte {other:#04x}")).into(),
                    );
                }
            },
            FieldKind::Int => Value::Int(self.cursor.ivarint()?),
            FieldKind::UInt => Value::UInt(self.cursor.uvarint()?),
            FieldKind::Float => Value::Float(self.cursor.f64()?),
            FieldKind::Str => Value::Str(self.cursor.str()?),
            FieldKind::Bytes => Value::Bytes(self.cursor.bytes()?),
            FieldKind::Optional(inner) => match self.cursor.u8()? {
                0 => Value::Null,
                1 => self.decode_value(inner)?,
                other => {
                    return Err(FramingError::Corruption(format!(
                        "invalid presence byte {other:#04x}"
                    ))
                    .into());
                }
            },
            FieldKind::List(elem) => {
                let count = self.count_prefix()?;
                let mut items = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    items.push(self.decode_value(elem)?);
                }
                Value::List(items)
            }
            FieldKind::Map(key_kind, value_kind) => {
                let count = self.count_prefix()?;
                let mut pairs = Vec::with_capacity(count.min(4096));
                for _ in 0..count {
                    let key = self.decode_value(key_kind)?;
                    let value = self.decode_value(value_kind)?;
                    pairs.push((key, value));
                }
                Value::Map(pairs)
            }
            FieldKind::Object(base) => self.decode_object(base)?,
        })
    }

    fn count_prefix(&mut self) -> Result<usize> {
        let count = self.cursor.uvarint()?;
        usize::try_from(count).map_err(|_| {
            FramingError::Corruption(format!("count {count} overflows usize")).into()
        })
    }
}
