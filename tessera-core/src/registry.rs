//! Runtime type registry.
//!
//! Maps a [`MessageId`] to the operations needed to rebuild a typed value
//! from an untyped frame. Build one during start-up with `&mut` access, then
//! share it read-only (typically as `Arc<TypeRegistry>`); lookups take no lock.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut registry = TypeRegistry::with_version(Version::new(1, 0, 0));
//! registry.register::<Login>()?;
//! registry.register::<Chat>()?;
//! let registry = Arc::new(registry);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::envelope::Envelope;
use crate::error::{CodecError, TesseraError};
use crate::message::{Format, Message, MessageId};

/// Registry version, checked by peers that request version verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    #[must_use]
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Pack into the 32-bit header field: `0x00MMmmpp`.
    #[inline]
    #[must_use]
    pub const fn to_u32(self) -> u32 {
        (self.major as u32) << 16 | (self.minor as u32) << 8 | self.patch as u32
    }

    #[inline]
    #[must_use]
    pub const fn from_u32(packed: u32) -> Self {
        Self {
            major: (packed >> 16) as u8,
            minor: (packed >> 8) as u8,
            patch: packed as u8,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A boxed, type-erased message instance.
pub type AnyMessage = Box<dyn Any + Send>;

type ConstructFn = fn() -> AnyMessage;
type EncodeFn = fn(&(dyn Any + Send)) -> Result<Vec<u8>, CodecError>;
type DecodeFn = fn(&[u8]) -> Result<AnyMessage, CodecError>;

/// The type-erased operations for one registered message type.
#[derive(Clone)]
pub struct RegistryEntry {
    id: MessageId,
    name: &'static str,
    format: &'static str,
    type_id: TypeId,
    construct: ConstructFn,
    encode: EncodeFn,
    decode: DecodeFn,
}

fn construct_erased<T: Message>() -> AnyMessage {
    Box::new(T::default())
}

fn encode_erased<T: Message>(value: &(dyn Any + Send)) -> Result<Vec<u8>, CodecError> {
    match value.downcast_ref::<T>() {
        Some(value) => value.encode(),
        None => Err(CodecError::structural(format!("value is not a `{}`", T::NAME))),
    }
}

fn decode_erased<T: Message>(bytes: &[u8]) -> Result<AnyMessage, CodecError> {
    Ok(Box::new(T::decode(bytes)?))
}

impl RegistryEntry {
    /// Build the entry for `T`.
    #[must_use]
    pub fn of<T: Message>() -> Self {
        Self {
            id: T::message_id(),
            name: T::NAME,
            format: <T::Format as Format>::NAME,
            type_id: TypeId::of::<T>(),
            construct: construct_erased::<T>,
            encode: encode_erased::<T>,
            decode: decode_erased::<T>,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Name of the wire format the type travels in.
    #[inline]
    #[must_use]
    pub fn format_name(&self) -> &'static str {
        self.format
    }

    /// Rust type behind this entry.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// A default-constructed instance.
    #[must_use]
    pub fn construct(&self) -> AnyMessage {
        (self.construct)()
    }

    pub fn encode(&self, value: &(dyn Any + Send)) -> Result<Vec<u8>, CodecError> {
        (self.encode)(value)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<AnyMessage, CodecError> {
        (self.decode)(bytes)
    }

    /// Whether `value` is an instance of this entry's type.
    #[inline]
    #[must_use]
    pub fn is_instance(&self, value: &(dyn Any + Send)) -> bool {
        (*value).type_id() == self.type_id
    }
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("format", &self.format)
            .finish()
    }
}

/// Append-only table of message types.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    entries: HashMap<MessageId, RegistryEntry>,
    names: HashMap<&'static str, MessageId>,
    version: Version,
}

impl TypeRegistry {
    /// Create an empty registry at version `0.0.0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with a version.
    #[must_use]
    pub fn with_version(version: Version) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Register `T`. Registering the same type again is a no-op.
    ///
    /// Fails with [`TesseraError::DuplicateType`] when a different type
    /// already owns `T`'s identifier; the existing entry is kept.
    pub fn register<T: Message>(&mut self) -> Result<MessageId, TesseraError> {
        self.insert(RegistryEntry::of::<T>())
    }

    /// Install a prepared entry, with the same rules as [`register`](Self::register).
    pub fn insert(&mut self, entry: RegistryEntry) -> Result<MessageId, TesseraError> {
        let id = entry.id;
        if let Some(existing) = self.entries.get(&id) {
            if existing.type_id == entry.type_id {
                tracing::trace!(type_id = %id, name = entry.name, "type already registered");
                return Ok(id);
            }
            tracing::warn!(
                type_id = %id,
                existing = existing.name,
                rejected = entry.name,
                "type id collision"
            );
            return Err(TesseraError::DuplicateType {
                id,
                existing: existing.name,
                rejected: entry.name,
            });
        }

        tracing::debug!(type_id = %id, name = entry.name, format = entry.format, "registered type");
        self.names.entry(entry.name).or_insert(id);
        self.entries.insert(id, entry);
        Ok(id)
    }

    /// Find the entry for `id`.
    pub fn lookup(&self, id: MessageId) -> Result<&RegistryEntry, TesseraError> {
        self.entries.get(&id).ok_or(TesseraError::UnknownType(id))
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&RegistryEntry> {
        self.entries.get(&id)
    }

    /// Find an entry by declared type name.
    #[must_use]
    pub fn lookup_name(&self, name: &str) -> Option<&RegistryEntry> {
        self.names.get(name).and_then(|id| self.entries.get(id))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.entries.contains_key(&id)
    }

    /// A typed envelope holding a default instance of the type behind `id`.
    pub fn create(&self, id: MessageId) -> Result<Envelope, TesseraError> {
        let entry = self.lookup(id)?;
        Ok(Envelope::from_boxed(id, entry.construct()))
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }
}
