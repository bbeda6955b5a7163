//! # tessera-core
//!
//! Core traits and types for the Tessera serialization framework.
//!
//! This crate provides:
//! - The node-traversal contract (`Serializer`, `Deserializer`, `Save`, `Load`)
//! - Adapters for std containers plus `MultiMap`, `MultiSet`, `Pair`, `BitSet`
//! - Field-reflection descriptors (`Reflect`, `Field`)
//! - Message identity (`MessageId`, `Message`, `Format`)
//! - The type registry and the type-erased `Envelope`
//! - Error types (`TesseraError`, `CodecError`, `TransportError`)
//! - The `Transport` trait and channel configuration

mod envelope;
mod error;
mod message;
mod reflect;
mod registry;
mod transport;
mod traverse;
mod types;

#[cfg(test)]
mod testing;

pub use envelope::Envelope;
pub use error::{CodecError, ErrorKind, TesseraError, TransportError};
pub use message::{Format, Message, MessageId};
pub use reflect::{
    load_struct, save_struct, Field, FieldError, FieldVisitor, FieldVisitorMut, Getter, GetterMut,
    Reflect,
};
pub use registry::{AnyMessage, RegistryEntry, TypeRegistry, Version};
pub use transport::{
    ChannelConfig, RecvFlags, SendFlags, Transport, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SLICE_SIZE,
};
pub use traverse::{
    array, fixed_node, node, object, Deserializer, FieldKey, Load, Save, Serializer,
};
pub use types::{BitSet, MultiMap, MultiSet, Pair};
