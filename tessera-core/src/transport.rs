//! Transport trait and channel configuration.
//!
//! The `Transport` trait abstracts a framed, bidirectional message stream
//! carrying [`Envelope`]s. `tessera-transport` implements it over any tokio
//! byte stream.

use std::future::Future;

use crate::envelope::Envelope;
use crate::error::TesseraError;

/// Default maximum frame payload size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Default size of one slice frame, header included.
pub const DEFAULT_SLICE_SIZE: usize = 1200;

/// A framed message stream.
///
/// At most one `send` and one `recv` are in flight at a time; concurrent
/// calls of the same kind queue behind each other.
pub trait Transport: Send + Sync {
    /// Encode and write one envelope.
    fn send(
        &self,
        envelope: Envelope,
        flags: SendFlags,
    ) -> impl Future<Output = Result<(), TesseraError>> + Send;

    /// Read one envelope.
    fn recv(&self, flags: RecvFlags) -> impl Future<Output = Result<Envelope, TesseraError>> + Send;

    /// Shut the stream down. Later operations fail with `TransportError::Closed`.
    fn close(&self) -> impl Future<Output = Result<(), TesseraError>> + Send;

    /// Check if the transport still accepts operations.
    fn is_open(&self) -> bool;
}

/// Per-channel framing limits.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum payload size in bytes, checked before any receive buffer is allocated.
    pub max_frame_size: usize,

    /// Size of one slice frame (header included) for sliced sends.
    pub slice_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            slice_size: DEFAULT_SLICE_SIZE,
        }
    }
}

impl ChannelConfig {
    /// Create a new channel configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum frame size.
    #[must_use]
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the slice frame size.
    #[must_use]
    pub fn slice_size(mut self, size: usize) -> Self {
        self.slice_size = size;
        self
    }
}

/// Options for one `send`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendFlags {
    /// Encode on the blocking worker pool instead of the calling task.
    pub offload: bool,

    /// Split the payload into slice frames.
    pub slice: bool,

    /// Announce the registry version before the message.
    pub verify_version: bool,
}

impl SendFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn offload(mut self, enabled: bool) -> Self {
        self.offload = enabled;
        self
    }

    #[must_use]
    pub fn slice(mut self, enabled: bool) -> Self {
        self.slice = enabled;
        self
    }

    #[must_use]
    pub fn verify_version(mut self, enabled: bool) -> Self {
        self.verify_version = enabled;
        self
    }
}

/// Options for one `recv`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecvFlags {
    /// Decode the payload before returning instead of on first cast.
    pub decode: bool,

    /// Run the eager decode on the blocking worker pool.
    pub offload: bool,
}

impl RecvFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn decode(mut self, enabled: bool) -> Self {
        self.decode = enabled;
        self
    }

    #[must_use]
    pub fn offload(mut self, enabled: bool) -> Self {
        self.offload = enabled;
        self
    }
}
