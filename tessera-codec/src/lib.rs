//! # tessera-codec
//!
//! Serialization backends and the wire frame codec for Tessera.
//!
//! This crate provides:
//! - `Binary` - compact little-endian byte stream
//! - `Json` - JSON text through a `serde_json::Value` tree
//! - `Xml` - element tree with attribute-valued scalar fields
//! - `FrameCodec` - type-tagged, length-prefixed frame encoder/decoder
//!
//! ## Frame Format
//!
//! ```text
//! +---------------+-------------+-------------+------------------+
//! | length (4 LE) | data (4 LE) | kind (2 LE) | payload (length) |
//! +---------------+-------------+-------------+------------------+
//! ```
//!
//! For a `Complete` frame `data` is the message type id.

mod binary;
mod frame;
mod json;
mod xml;

pub use binary::{Binary, BinaryDeserializer, BinarySerializer};
pub use frame::{Frame, FrameCodec, FrameHeader, FrameKind};
pub use json::{Json, JsonDeserializer, JsonSerializer};
pub use xml::{Xml, XmlDeserializer, XmlSerializer};
