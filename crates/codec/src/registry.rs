//! Type registry: stable wire tags and declared field layouts
//!
//! The registry is the codec's dispatch table. Each registered type gets a
//! [`TypeDescriptor`]: a registry-unique numeric tag, an explicitly declared
//! field layout, and its place in a single-inheritance hierarchy tree.
//!
//! Tags are caller-controlled on purpose. They are never derived from type
//! names or hashes: journal data must remain decodable after the
//! application is recompiled, renamed or refactored, so the `{type -> tag}`
//! binding is a contract the caller maintains across versions.
//!
//! Layouts are declared during a configuration phase, never inferred from
//! runtime introspection, so the wire format is deterministic and
//! independent of source declaration order.
//!
//! ## Concurrency
//!
//! A registry is internally synchronized: registration takes a write lock,
//! dispatch takes a read lock. After the configuration phase the registry
//! serves unlimited concurrent read-only dispatch; an encode/decode call
//! holds one read guard for its whole traversal.

use std::collections::HashMap;
use std::fmt;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::debug;

use arkiv_core::error::{DispatchError, RegistrationError, Result};
use arkiv_core::types::{Tag, TypeKey};

/// Semantic kind of one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Boolean, one byte on the wire.
    Bool,
    /// Signed 64-bit integer, zigzag varint.
    Int,
    /// Unsigned 64-bit integer, varint.
    UInt,
    /// IEEE-754 double, 8 bytes little-endian.
    Float,
    /// Length-prefixed UTF-8 string.
    Str,
    /// Length-prefixed raw bytes.
    Bytes,
    /// Present/absent wrapper around another kind.
    Optional(Box<FieldKind>),
    /// Count-prefixed sequence of one kind.
    List(Box<FieldKind>),
    /// Count-prefixed key/value pairs.
    Map(Box<FieldKind>, Box<FieldKind>),
    /// Nested object slot; the key names the slot's declared base type.
    /// Any registered descendant of the base may appear here.
    Object(TypeKey),
}

impl FieldKind {
    /// Optional wrapper, without the `Box` noise at call sites.
    pub fn optional(inner: FieldKind) -> Self {
        FieldKind::Optional(Box::new(inner))
    }

    /// List kind, without the `Box` noise at call sites.
    pub fn list(elem: FieldKind) -> Self {
        FieldKind::List(Box::new(elem))
    }

    /// Map kind, without the `Box` noise at call sites.
    pub fn map(key: FieldKind, value: FieldKind) -> Self {
        FieldKind::Map(Box::new(key), Box::new(value))
    }

    /// Object slot declared against `base`.
    pub fn object(base: impl Into<TypeKey>) -> Self {
        FieldKind::Object(base.into())
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Bool => write!(f, "Bool"),
            FieldKind::Int => write!(f, "Int"),
            FieldKind::UInt => write!(f, "UInt"),
            FieldKind::Float => write!(f, "Float"),
            FieldKind::Str => write!(f, "Str"),
            FieldKind::Bytes => write!(f, "Bytes"),
            FieldKind::Optional(inner) => write!(f, "Optional({inner})"),
            FieldKind::List(elem) => write!(f, "List({elem})"),
            FieldKind::Map(k, v) => write!(f, "Map({k}, {v})"),
            FieldKind::Object(base) => write!(f, "Object({base})"),
        }
    }
}

/// One declared field: name, wire position, kind.
///
/// Positions order fields on the wire and are unique within the declaring
/// type's own fields; inherited fields keep the base type's positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    /// Field name (diagnostics and layout lookups; not on the wire).
    pub name: String,
    /// Wire position within the declaring type.
    pub position: u16,
    /// Semantic kind.
    pub kind: FieldKind,
}

/// Everything the codec knows about one registered type.
///
/// Descriptors are created during the configuration phase and are immutable
/// once encode/decode traffic starts. The tag is the caller contract: it
/// must remain identical across process restarts that read
/// previously-written data.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Stable type key.
    pub key: TypeKey,
    /// Registry-unique wire tag.
    pub tag: Tag,
    /// Base type, if this type was registered as a subtype. The base
    /// references form a tree; cycles are rejected at registration.
    pub base: Option<TypeKey>,
    /// Own declared fields, ascending position. Inherited fields live on
    /// the base descriptors.
    pub fields: Vec<FieldDef>,
    /// Direct derived types, in registration order.
    pub subtypes: Vec<TypeKey>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    by_key: HashMap<TypeKey, TypeDescriptor>,
    by_tag: HashMap<Tag, TypeKey>,
    next_auto_tag: Tag,
}

impl RegistryInner {
    pub(crate) fn get(&self, key: &TypeKey) -> std::result::Result<&TypeDescriptor, DispatchError> {
        self.by_key
            .get(key)
            .ok_or_else(|| DispatchError::UnregisteredType {
                type_key: key.clone(),
            })
    }

    /// Decode-side dispatch: the tag must name `base` itself or a
    /// registered descendant of `base`.
    pub(crate) fn get_by_tag(
        &self,
        base: &TypeKey,
        tag: Tag,
    ) -> std::result::Result<&TypeDescriptor, DispatchError> {
        let unknown = || DispatchError::UnknownTag {
            base: base.clone(),
            tag,
        };
        let key = self.by_tag.get(&tag).ok_or_else(unknown)?;
        let desc = self.by_key.get(key).ok_or_else(unknown)?;
        if desc.key != *base && !self.is_descendant(&desc.key, base) {
            return Err(unknown());
        }
        Ok(desc)
    }

    /// True if `key`'s base chain contains `ancestor`.
    pub(crate) fn is_descendant(&self, key: &TypeKey, ancestor: &TypeKey) -> bool {
        let mut cur = key;
        while let Some(desc) = self.by_key.get(cur) {
            match &desc.base {
                Some(base) if base == ancestor => return true,
                Some(base) => cur = base,
                None => return false,
            }
        }
        false
    }

    /// Effective wire layout: base-chain fields from the root ancestor
    /// down, each level in ascending declared position.
    pub(crate) fn effective_fields<'a>(&'a self, desc: &'a TypeDescriptor) -> Vec<&'a FieldDef> {
        let mut chain = vec![desc];
        let mut cur = desc;
        while let Some(base_key) = &cur.base {
            match self.by_key.get(base_key) {
                Some(base) => {
                    chain.push(base);
                    cur = base;
                }
                None => break,
            }
        }
        chain
            .iter()
            .rev()
            .flat_map(|d| d.fields.iter())
            .collect()
    }
}

/// Registry of type descriptors, indexed by key and by tag.
///
/// Construct once, register everything during configuration, then share
/// behind an `Arc` with every codec instance.
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                by_key: HashMap::new(),
                by_tag: HashMap::new(),
                next_auto_tag: 1,
            }),
        }
    }

    /// Register a type with an auto-assigned tag (registration order).
    ///
    /// Idempotent: a known key returns its existing tag unchanged.
    pub fn register(&self, key: impl Into<TypeKey>) -> Tag {
        let key = key.into();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_key.get(&key) {
            return existing.tag;
        }
        let mut tag = inner.next_auto_tag;
        while inner.by_tag.contains_key(&tag) {
            tag += 1;
        }
        inner.next_auto_tag = tag + 1;
        Self::insert(&mut inner, key, tag, None);
        tag
    }

    /// Register a type under an explicit, caller-stable tag.
    ///
    /// Idempotent: a known key returns its existing tag unchanged (the
    /// first registration wins). An explicit tag already bound to a
    /// different key fails with `TagCollision`.
    pub fn register_with_tag(&self, key: impl Into<TypeKey>, tag: Tag) -> Result<Tag> {
        let key = key.into();
        let mut inner = self.inner.write();
        if let Some(existing) = inner.by_key.get(&key) {
            return Ok(existing.tag);
        }
        if let Some(owner) = inner.by_tag.get(&tag) {
            return Err(RegistrationError::TagCollision {
                tag,
                existing: owner.clone(),
                incoming: key,
            }
            .into());
        }
        Self::insert(&mut inner, key, tag, None);
        Ok(tag)
    }

    /// Declare `derived` as a subtype of `base`, registered under `tag`.
    ///
    /// The base must already be registered (no forward references). An
    /// unknown derived key is registered here in one step; a known derived
    /// key must already carry the same tag and, if subtyped, the same base.
    /// Re-declaring an identical edge is a no-op.
    pub fn register_subtype(
        &self,
        base: impl Into<TypeKey>,
        tag: Tag,
        derived: impl Into<TypeKey>,
    ) -> Result<()> {
        let base = base.into();
        let derived = derived.into();
        let mut inner = self.inner.write();

        if !inner.by_key.contains_key(&base) {
            return Err(RegistrationError::UnknownBaseType { base }.into());
        }

        match inner.by_key.get(&derived) {
            Some(existing) => {
                if existing.tag != tag {
                    return Err(RegistrationError::TagCollision {
                        tag: existing.tag,
                        existing: derived.clone(),
                        incoming: derived,
                    }
                    .into());
                }
                match &existing.base {
                    Some(current) if *current == base => return Ok(()), // no-op
                    Some(current) => {
                        return Err(RegistrationError::RebasedType {
                            derived,
                            current_base: current.clone(),
                            base,
                        }
                        .into());
                    }
                    None => {
                        // Late subtyping of a standalone type; guard the tree.
                        if inner.is_descendant(&base, &derived) {
                            return Err(
                                RegistrationError::HierarchyCycle { base, derived }.into()
                            );
                        }
                    }
                }
            }
            None => {
                if let Some(owner) = inner.by_tag.get(&tag) {
                    return Err(RegistrationError::TagCollision {
                        tag,
                        existing: owner.clone(),
                        incoming: derived,
                    }
                    .into());
                }
                Self::insert(&mut inner, derived.clone(), tag, Some(base.clone()));
            }
        }

        if let Some(desc) = inner.by_key.get_mut(&derived) {
            desc.base = Some(base.clone());
        }
        if let Some(base_desc) = inner.by_key.get_mut(&base) {
            if !base_desc.subtypes.contains(&derived) {
                base_desc.subtypes.push(derived.clone());
            }
        }
        debug!(base = %base, derived = %derived, tag, "registered subtype");
        Ok(())
    }

    /// Declare one field of a registered type's wire layout.
    ///
    /// Positions must be unique within the type's own fields; inherited
    /// fields occupy the base type's positions and are not renumbered.
    /// Re-declaring an identical field is a no-op.
    pub fn register_field(
        &self,
        key: impl Into<TypeKey>,
        position: u16,
        name: &str,
        kind: FieldKind,
    ) -> Result<()> {
        let key = key.into();
        let mut inner = self.inner.write();
        let desc = inner
            .by_key
            .get_mut(&key)
            .ok_or_else(|| DispatchError::UnregisteredType {
                type_key: key.clone(),
            })?;

        if let Some(existing) = desc.fields.iter().find(|f| f.position == position) {
            if existing.name == name && existing.kind == kind {
                return Ok(()); // no-op
            }
            return Err(RegistrationError::DuplicatePosition {
                type_key: key,
                position,
            }
            .into());
        }

        let def = FieldDef {
            name: name.to_string(),
            position,
            kind,
        };
        let at = desc
            .fields
            .iter()
            .position(|f| f.position > position)
            .unwrap_or(desc.fields.len());
        desc.fields.insert(at, def);
        Ok(())
    }

    /// Encode-side dispatch: descriptor for a concrete type key.
    pub fn resolve(&self, key: &TypeKey) -> Result<TypeDescriptor> {
        Ok(self.inner.read().get(key)?.clone())
    }

    /// Decode-side dispatch: descriptor for the type registered under `tag`
    /// within `base`'s hierarchy.
    pub fn resolve_by_tag(&self, base: &TypeKey, tag: Tag) -> Result<TypeDescriptor> {
        Ok(self.inner.read().get_by_tag(base, tag)?.clone())
    }

    /// True if `key` is registered.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.inner.read().by_key.contains_key(key)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.inner.read().by_key.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read guard over the dispatch tables for one encode/decode call.
    pub(crate) fn snapshot(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read()
    }

    fn insert(inner: &mut RegistryInner, key: TypeKey, tag: Tag, base: Option<TypeKey>) {
        debug!(key = %key, tag, "registered type");
        inner.by_tag.insert(tag, key.clone());
        inner.by_key.insert(
            key.clone(),
            TypeDescriptor {
                key,
                tag,
                base,
                fields: Vec::new(),
                subtypes: Vec::new(),
            },
        );
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("TypeRegistry")
            .field("types", &inner.by_key.len())
            .finish()
    }
}
