//! # Tessera
//!
//! Describe a structure once, serialize it through interchangeable backends,
//! and exchange it over a framed stream with runtime type dispatch.
//!
//! Tessera provides:
//! - **Node-traversal serialization**: one `Save`/`Load` contract shared by
//!   every backend, with adapters for std containers, tuples, atomics, and more
//! - **Reflection**: `#[derive(Reflect)]` exposes named fields in declaration order
//! - **Backends**: JSON, compact little-endian binary, and XML
//! - **Typed envelopes**: a `TypeRegistry` turns untyped frames back into
//!   concrete values, lazily on first `cast`
//! - **Framed transport**: a tokio channel with optional worker offload,
//!   sliced sends, version verification, and cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! #[derive(Debug, Default, PartialEq, Reflect, Message)]
//! #[message(name = "demo.Sample")]
//! struct Sample {
//!     id: i64,
//!     msg: String,
//!     numbers: Vec<i32>,
//! }
//!
//! let sample = Sample { id: 1, msg: "hi".into(), numbers: vec![1, 2, 3] };
//! let bytes = sample.encode().unwrap();
//! assert_eq!(bytes, br#"{"id":1,"msg":"hi","numbers":[1,2,3]}"#);
//!
//! let mut registry = TypeRegistry::new();
//! registry.register::<Sample>().unwrap();
//!
//! let mut envelope = Envelope::from_raw(Sample::message_id(), bytes);
//! assert_eq!(*envelope.cast::<Sample>(&registry).unwrap(), sample);
//! ```
//!
//! ## Architecture
//!
//! - [`tessera-core`] - traversal contract, adapters, reflection, registry, envelope, errors
//! - [`tessera-codec`] - JSON, binary and XML backends plus the frame codec
//! - [`tessera-transport`] - framed channel, worker offload, TCP
//! - [`tessera-macros`] - `#[derive(Reflect)]`, `#[derive(Message)]`

extern crate self as tessera;

// Re-export core types
pub use tessera_core::{
    array, fixed_node, load_struct, node, object, save_struct, AnyMessage, BitSet, ChannelConfig,
    CodecError, Deserializer, Envelope, ErrorKind, Field, FieldError, FieldKey, FieldVisitor,
    FieldVisitorMut, Format, Getter, GetterMut, Load, Message, MessageId, MultiMap, MultiSet,
    Pair, RecvFlags, Reflect, RegistryEntry, Save, SendFlags, Serializer, TesseraError,
    Transport, TransportError, TypeRegistry, Version, DEFAULT_MAX_FRAME_SIZE, DEFAULT_SLICE_SIZE,
};

// Re-export backends and framing
pub use tessera_codec::{
    Binary, BinaryDeserializer, BinarySerializer, Frame, FrameCodec, FrameHeader, FrameKind, Json,
    JsonDeserializer, JsonSerializer, Xml, XmlDeserializer, XmlSerializer,
};

// Re-export transport
pub use tessera_transport::{
    CancelHandle, Channel, ChannelState, TcpChannel, TcpClient, TcpClientConfig, TcpServer,
    TcpServerConfig,
};

// Re-export derives
pub use tessera_macros::{Message, Reflect};

/// Prelude module for convenient imports.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Binary, Channel, Envelope, Format, Json, Load, Message, RecvFlags, Reflect, Save,
        SendFlags, TesseraError, TypeRegistry, Xml,
    };

    pub use tessera_core::Transport;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
