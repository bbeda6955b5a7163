//! Type-erased message envelope.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;

use crate::error::TesseraError;
use crate::message::{Message, MessageId};
use crate::registry::{AnyMessage, TypeRegistry};

enum Payload {
    Typed(AnyMessage),
    Raw(Vec<u8>),
}

/// A message that is either a decoded instance or raw tagged bytes.
///
/// Received envelopes start out raw; [`cast`](Envelope::cast) decodes them on
/// first use and keeps the decoded instance for later casts. A failed cast
/// leaves the envelope exactly as it was.
///
/// ## Example
///
/// ```rust,ignore
/// let mut envelope = channel.recv(RecvFlags::default()).await?;
/// if envelope.id() == Chat::message_id() {
///     let chat = envelope.cast::<Chat>(&registry)?;
///     println!("{}", chat.text);
/// }
/// ```
pub struct Envelope {
    id: MessageId,
    payload: Payload,
}

impl Envelope {
    /// Wrap a typed instance, tagging it with `T`'s identifier.
    #[must_use]
    pub fn new<T: Message>(value: T) -> Self {
        Self {
            id: T::message_id(),
            payload: Payload::Typed(Box::new(value)),
        }
    }

    /// Wrap undecoded bytes received for `id`.
    #[must_use]
    pub fn from_raw(id: MessageId, bytes: Vec<u8>) -> Self {
        Self {
            id,
            payload: Payload::Raw(bytes),
        }
    }

    pub(crate) fn from_boxed(id: MessageId, value: AnyMessage) -> Self {
        Self {
            id,
            payload: Payload::Typed(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Whether the payload has been decoded into a typed instance.
    #[inline]
    #[must_use]
    pub fn is_decoded(&self) -> bool {
        matches!(self.payload, Payload::Typed(_))
    }

    /// The undecoded bytes, if the envelope is still raw.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Typed(_) => None,
        }
    }

    /// Borrow the typed instance without decoding.
    #[must_use]
    pub fn get<T: Message>(&self) -> Option<&T> {
        match &self.payload {
            Payload::Typed(value) if self.id == T::message_id() => value.downcast_ref(),
            _ => None,
        }
    }

    /// Encoded payload bytes. Typed envelopes are encoded through the registry.
    pub fn to_bytes(&self, registry: &TypeRegistry) -> Result<Cow<'_, [u8]>, TesseraError> {
        match &self.payload {
            Payload::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            Payload::Typed(value) => {
                let entry = registry.lookup(self.id)?;
                Ok(Cow::Owned(entry.encode(value.as_ref())?))
            }
        }
    }

    /// Consume the envelope into its encoded payload bytes.
    pub fn into_bytes(self, registry: &TypeRegistry) -> Result<Vec<u8>, TesseraError> {
        match self.payload {
            Payload::Raw(bytes) => Ok(bytes),
            Payload::Typed(value) => {
                let entry = registry.lookup(self.id)?;
                Ok(entry.encode(value.as_ref())?)
            }
        }
    }

    /// Decode a raw payload with whatever type the registry holds for its id.
    ///
    /// No-op on a typed envelope. On failure the envelope stays raw.
    pub fn decode(&mut self, registry: &TypeRegistry) -> Result<(), TesseraError> {
        if let Payload::Raw(bytes) = &self.payload {
            let value = registry.lookup(self.id)?.decode(bytes)?;
            self.payload = Payload::Typed(value);
        }
        Ok(())
    }

    /// Reinterpret as `T`, decoding a raw payload on first use.
    ///
    /// Fails with [`TesseraError::TypeMismatch`] when the envelope's id is not
    /// `T`'s, or the registry maps the id to another type; with
    /// [`TesseraError::UnknownType`] when the id is unregistered; or with a
    /// codec error when the bytes do not decode. Nothing changes on failure.
    pub fn cast<T: Message>(&mut self, registry: &TypeRegistry) -> Result<&mut T, TesseraError> {
        let expected = T::message_id();
        let mismatch = TesseraError::TypeMismatch {
            expected,
            actual: self.id,
        };
        if self.id != expected {
            return Err(mismatch);
        }

        if let Payload::Raw(bytes) = &self.payload {
            let entry = registry.lookup(self.id)?;
            if entry.type_id() != TypeId::of::<T>() {
                return Err(mismatch);
            }
            let value = T::decode(bytes)?;
            tracing::trace!(type_id = %self.id, name = T::NAME, len = bytes.len(), "decoded envelope");
            self.payload = Payload::Typed(Box::new(value));
        }

        match &mut self.payload {
            Payload::Typed(value) => value.downcast_mut::<T>().ok_or(mismatch),
            Payload::Raw(_) => Err(mismatch),
        }
    }

    /// Cast and take ownership of the instance.
    pub fn into_inner<T: Message>(mut self, registry: &TypeRegistry) -> Result<T, TesseraError> {
        self.cast::<T>(registry)?;
        let id = self.id;
        match self.payload {
            Payload::Typed(value) => value.downcast::<T>().map(|value| *value).map_err(|_| {
                TesseraError::TypeMismatch {
                    expected: T::message_id(),
                    actual: id,
                }
            }),
            Payload::Raw(_) => Err(TesseraError::TypeMismatch {
                expected: T::message_id(),
                actual: id,
            }),
        }
    }
}

impl<T: Message> From<T> for Envelope {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Envelope");
        out.field("id", &self.id);
        match &self.payload {
            Payload::Typed(_) => out.field("payload", &"typed"),
            Payload::Raw(bytes) => out.field("raw_len", &bytes.len()),
        };
        out.finish()
    }
}
