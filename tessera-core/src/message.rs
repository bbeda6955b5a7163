//! Message identity and wire formats.

use std::fmt;

use crate::error::CodecError;
use crate::traverse::{Load, Save};

/// Stable identifier of a message type.
///
/// Derived from the declared type name with 32-bit FNV-1a, so it is the same
/// in every process that declares the type under the same name. A type may
/// pin an explicit identifier instead (see [`Message::ID`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u32);

impl MessageId {
    const FNV_OFFSET: u32 = 0x811c_9dc5;
    const FNV_PRIME: u32 = 0x0100_0193;

    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Hash a declared type name into an identifier.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<u32> for MessageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// A complete wire format: a serializer/deserializer pair over byte buffers.
pub trait Format: Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;

    fn encode<T: Save + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode `bytes` into `value` in place.
    ///
    /// On error `value` may be partially written; callers that need
    /// all-or-nothing semantics decode into a scratch value.
    fn decode<T: Load + ?Sized>(bytes: &[u8], value: &mut T) -> Result<(), CodecError>;
}

/// A top-level structure that can travel inside an envelope.
///
/// Usually derived with `#[derive(Message)]`.
pub trait Message: Save + Load + Default + Send + 'static {
    /// Declared name, hashed into the default identifier.
    const NAME: &'static str;

    /// Explicit identifier overriding the name hash.
    const ID: Option<u32> = None;

    /// Format the payload travels in.
    type Format: Format;

    #[inline]
    fn message_id() -> MessageId {
        match Self::ID {
            Some(id) => MessageId::new(id),
            None => MessageId::from_name(Self::NAME),
        }
    }

    #[inline]
    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Self::Format::encode(self)
    }

    /// Decode a fresh instance.
    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut value = Self::default();
        Self::Format::decode(bytes, &mut value)?;
        Ok(value)
    }
}
