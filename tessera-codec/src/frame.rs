//! Type-tagged, length-prefixed frame codec.

use ntex_bytes::{Buf, BufMut, Bytes, BytesMut};
use ntex_codec::{Decoder, Encoder};

use tessera_core::{MessageId, TransportError, Version, DEFAULT_MAX_FRAME_SIZE};

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum FrameKind {
    /// A whole message. `data` is the type id.
    Complete = 0,
    /// One piece of a sliced message. `data` is the byte offset.
    Slice = 1,
    /// Announces a sliced message. `length` is the total payload size, `data` the type id.
    SliceHeader = 2,
    /// The sender abandoned the current message.
    Cancel = 3,
    /// `data` is the sender's packed registry version.
    VersionVerification = 4,
}

impl FrameKind {
    /// Whether `length` payload bytes follow the header.
    #[inline]
    #[must_use]
    pub fn carries_payload(self) -> bool {
        matches!(self, Self::Complete | Self::Slice)
    }
}

impl TryFrom<u16> for FrameKind {
    type Error = TransportError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Complete),
            1 => Ok(Self::Slice),
            2 => Ok(Self::SliceHeader),
            3 => Ok(Self::Cancel),
            4 => Ok(Self::VersionVerification),
            other => Err(TransportError::InvalidFrame(format!(
                "unknown frame kind {other}"
            ))),
        }
    }
}

/// Fixed-size frame header.
///
/// ```text
/// +---------------+-------------+-------------+
/// | length (4 LE) | data (4 LE) | kind (2 LE) |
/// +---------------+-------------+-------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub data: u32,
    pub kind: FrameKind,
}

impl FrameHeader {
    /// Encoded header size in bytes.
    pub const LEN: usize = 10;

    #[must_use]
    pub const fn complete(id: MessageId, length: u32) -> Self {
        Self {
            length,
            data: id.get(),
            kind: FrameKind::Complete,
        }
    }

    #[must_use]
    pub const fn slice_header(id: MessageId, total: u32) -> Self {
        Self {
            length: total,
            data: id.get(),
            kind: FrameKind::SliceHeader,
        }
    }

    #[must_use]
    pub const fn slice(offset: u32, length: u32) -> Self {
        Self {
            length,
            data: offset,
            kind: FrameKind::Slice,
        }
    }

    #[must_use]
    pub const fn cancel() -> Self {
        Self {
            length: 0,
            data: 0,
            kind: FrameKind::Cancel,
        }
    }

    #[must_use]
    pub const fn version(version: Version) -> Self {
        Self {
            length: 0,
            data: version.to_u32(),
            kind: FrameKind::VersionVerification,
        }
    }

    /// Number of payload bytes that follow this header.
    #[inline]
    #[must_use]
    pub fn payload_len(&self) -> usize {
        if self.kind.carries_payload() {
            self.length as usize
        } else {
            0
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&self.length.to_le_bytes());
        out[4..8].copy_from_slice(&self.data.to_le_bytes());
        out[8..10].copy_from_slice(&(self.kind as u16).to_le_bytes());
        out
    }

    /// Parse a header. Does not check the length against any bound.
    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Result<Self, TransportError> {
        let length = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let data = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let kind = FrameKind::try_from(u16::from_le_bytes([bytes[8], bytes[9]]))?;
        Ok(Self { length, data, kind })
    }
}

/// A header with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// A complete message frame.
    pub fn complete(id: MessageId, payload: impl Into<Bytes>) -> Result<Self, TransportError> {
        let payload = payload.into();
        let length = frame_len(payload.len())?;
        Ok(Self {
            header: FrameHeader::complete(id, length),
            payload,
        })
    }

    /// A frame without payload bytes.
    #[must_use]
    pub fn control(header: FrameHeader) -> Self {
        Self {
            header,
            payload: Bytes::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }
}

fn frame_len(len: usize) -> Result<u32, TransportError> {
    u32::try_from(len).map_err(|_| TransportError::FrameTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// Frame encoder/decoder.
///
/// The declared length is checked against `max_frame_size` as soon as the
/// header is readable, before any payload buffer is reserved.
///
/// ## Example
///
/// ```rust
/// use ntex_bytes::BytesMut;
/// use ntex_codec::{Decoder, Encoder};
/// use tessera_codec::{Frame, FrameCodec, FrameKind};
/// use tessera_core::MessageId;
///
/// let codec = FrameCodec::new();
/// let mut buf = BytesMut::new();
///
/// let frame = Frame::complete(MessageId::new(7), &b"hello"[..]).unwrap();
/// codec.encode(frame, &mut buf).unwrap();
/// assert_eq!(buf.len(), 10 + 5);
///
/// let decoded = codec.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(decoded.kind(), FrameKind::Complete);
/// assert_eq!(&decoded.payload[..], b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    #[inline]
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Parse and bound-check a header.
    pub fn decode_header(&self, bytes: &[u8; FrameHeader::LEN]) -> Result<FrameHeader, TransportError> {
        let header = FrameHeader::from_bytes(bytes)?;
        self.check_len(header.length as usize)?;
        Ok(header)
    }

    #[inline]
    pub fn check_len(&self, size: usize) -> Result<(), TransportError> {
        if size > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }

    /// Write a header and payload into `dst`.
    pub fn encode_frame(
        &self,
        header: &FrameHeader,
        payload: &[u8],
        dst: &mut BytesMut,
    ) -> Result<(), TransportError> {
        self.check_len(header.length as usize)?;
        if payload.len() != header.payload_len() {
            return Err(TransportError::InvalidFrame(format!(
                "{:?} frame declares {} payload bytes, got {}",
                header.kind,
                header.payload_len(),
                payload.len()
            )));
        }

        dst.reserve(FrameHeader::LEN + payload.len());
        dst.put_u32_le(header.length);
        dst.put_u32_le(header.data);
        dst.put_u16_le(header.kind as u16);
        dst.put_slice(payload);
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < FrameHeader::LEN {
            return Ok(None);
        }

        let mut raw = [0u8; FrameHeader::LEN];
        raw.copy_from_slice(&src[..FrameHeader::LEN]);
        let header = self.decode_header(&raw)?;

        let total_len = FrameHeader::LEN + header.payload_len();
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        src.advance(FrameHeader::LEN);
        let payload = src.split_to(header.payload_len()).freeze();

        Ok(Some(Frame { header, payload }))
    }
}

impl Encoder for FrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn encode(&self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_frame(&item.header, &item.payload, dst)
    }
}
