//! Framed envelope channel over any tokio byte stream.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ntex_bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};

use tessera_codec::{FrameCodec, FrameHeader, FrameKind};
use tessera_core::{
    ChannelConfig, Envelope, MessageId, RecvFlags, SendFlags, TesseraError, Transport,
    TransportError, TypeRegistry, Version,
};

use crate::worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Open,
    Cancelled,
    Closing,
    Closed,
}

impl Signal {
    fn error(self) -> TransportError {
        match self {
            Self::Cancelled => TransportError::Cancelled,
            Self::Open | Self::Closing | Self::Closed => TransportError::Closed,
        }
    }
}

/// Observable channel state.
///
/// A channel sending and receiving at the same time reports `Sending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Sending,
    Receiving,
    /// Cancelled; every operation fails until the channel is closed.
    Cancelled,
    Closing,
    Closed,
}

/// Cancels in-flight and future operations on one channel.
///
/// Cancellation is sticky: the channel should be closed afterwards.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signal: Arc<watch::Sender<Signal>>,
}

impl CancelHandle {
    /// Unblock every suspended `send`/`recv` with `TransportError::Cancelled`.
    ///
    /// Returns `false` if the channel was already cancelled or closed.
    pub fn cancel(&self) -> bool {
        let cancelled = self.signal.send_if_modified(|signal| {
            if *signal == Signal::Open {
                *signal = Signal::Cancelled;
                true
            } else {
                false
            }
        });
        if cancelled {
            tracing::debug!("channel cancelled");
        }
        cancelled
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow() == Signal::Cancelled
    }
}

/// Counts the calls of one kind in flight, including those waiting for the lock.
struct Busy<'a>(&'a AtomicUsize);

impl<'a> Busy<'a> {
    fn enter(count: &'a AtomicUsize) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Sends and receives [`Envelope`]s as frames over a byte stream.
///
/// Reads and writes go through separate halves, so one `send` and one `recv`
/// may run concurrently. Further calls of the same kind wait their turn.
/// The [`TypeRegistry`] is shared read-only.
///
/// ## Example
///
/// ```rust,ignore
/// let (a, b) = tokio::io::duplex(4096);
/// let registry = Arc::new(registry);
/// let left = Channel::new(a, registry.clone());
/// let right = Channel::new(b, registry.clone());
///
/// left.send(Envelope::new(Ping::default()), SendFlags::new()).await?;
/// let mut envelope = right.recv(RecvFlags::new()).await?;
/// let ping = envelope.cast::<Ping>(&registry)?;
/// ```
#[derive(Debug)]
pub struct Channel<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    registry: Arc<TypeRegistry>,
    codec: FrameCodec,
    config: ChannelConfig,
    signal: Arc<watch::Sender<Signal>>,
    sending: AtomicUsize,
    receiving: AtomicUsize,
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Wrap a stream with the default configuration.
    pub fn new(stream: S, registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(stream, registry, ChannelConfig::default())
    }

    pub fn with_config(stream: S, registry: Arc<TypeRegistry>, config: ChannelConfig) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        let (signal, _) = watch::channel(Signal::Open);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            registry,
            codec: FrameCodec::with_max_frame_size(config.max_frame_size),
            config,
            signal: Arc::new(signal),
            sending: AtomicUsize::new(0),
            receiving: AtomicUsize::new(0),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        match *self.signal.borrow() {
            Signal::Closed => ChannelState::Closed,
            Signal::Closing => ChannelState::Closing,
            Signal::Cancelled => ChannelState::Cancelled,
            Signal::Open if self.sending.load(Ordering::Acquire) > 0 => ChannelState::Sending,
            Signal::Open if self.receiving.load(Ordering::Acquire) > 0 => ChannelState::Receiving,
            Signal::Open => ChannelState::Idle,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.signal.borrow() == Signal::Open
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            signal: self.signal.clone(),
        }
    }

    /// Shorthand for `cancel_handle().cancel()`.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run `op` until it completes or the channel is cancelled or closed.
    async fn interruptible<F: Future>(
        &self,
        signal: &mut watch::Receiver<Signal>,
        op: F,
    ) -> Result<F::Output, TransportError> {
        tokio::select! {
            biased;
            stopped = signal.wait_for(|s| *s != Signal::Open) => {
                let stopped = stopped.map(|s| *s).unwrap_or(Signal::Closed);
                Err(stopped.error())
            }
            output = op => Ok(output),
        }
    }

    /// Encode and write one envelope.
    pub async fn send(&self, envelope: Envelope, flags: SendFlags) -> Result<(), TesseraError> {
        let _busy = Busy::enter(&self.sending);
        let mut signal = self.signal.subscribe();

        let id = envelope.id();
        let payload = if flags.offload {
            self.interruptible(&mut signal, worker::encode(self.registry.clone(), envelope))
                .await??
        } else {
            self.interruptible(&mut signal, async { envelope.into_bytes(&self.registry) })
                .await??
        };
        self.codec.check_len(payload.len())?;

        let mut writer = self.interruptible(&mut signal, self.writer.lock()).await?;

        let mut buf = BytesMut::new();
        if flags.verify_version {
            let header = FrameHeader::version(self.registry.version());
            self.codec.encode_frame(&header, &[], &mut buf)?;
        }

        let chunk = self.config.slice_size.saturating_sub(FrameHeader::LEN).max(1);
        let length = frame_len(payload.len())?;
        if !flags.slice || payload.len() <= chunk {
            self.codec
                .encode_frame(&FrameHeader::complete(id, length), &payload, &mut buf)?;
            self.write(&mut signal, &mut *writer, &buf).await?;
            tracing::debug!(type_id = %id, len = payload.len(), "sent frame");
            return Ok(());
        }

        self.codec
            .encode_frame(&FrameHeader::slice_header(id, length), &[], &mut buf)?;
        match self.write_frames(&mut signal, &mut *writer, &buf).await {
            Ok(()) => {}
            // Nothing reached the peer yet.
            Err((TransportError::Cancelled, 0)) => return Err(TransportError::Cancelled.into()),
            Err((TransportError::Cancelled, done)) => {
                return self.abort_slices(&mut *writer, &buf[done..], id, 0).await;
            }
            Err((e, _)) => return Err(e.into()),
        }

        let mut offset = 0usize;
        for piece in payload.chunks(chunk) {
            if *signal.borrow() == Signal::Cancelled {
                return self.abort_slices(&mut *writer, &[], id, offset).await;
            }

            buf.clear();
            let header = FrameHeader::slice(frame_len(offset)?, frame_len(piece.len())?);
            self.codec.encode_frame(&header, piece, &mut buf)?;
            match self.write_frames(&mut signal, &mut *writer, &buf).await {
                Ok(()) => {}
                Err((TransportError::Cancelled, done)) => {
                    return self.abort_slices(&mut *writer, &buf[done..], id, offset).await;
                }
                Err((e, _)) => return Err(e.into()),
            }
            offset += piece.len();
        }

        tracing::debug!(type_id = %id, len = payload.len(), chunk, "sent sliced frame");
        Ok(())
    }

    /// Write whole frames, reporting how many bytes were written when interrupted.
    ///
    /// The count lets a cancelled sliced send complete the frame it was in.
    async fn write_frames(
        &self,
        signal: &mut watch::Receiver<Signal>,
        writer: &mut WriteHalf<S>,
        bytes: &[u8],
    ) -> Result<(), (TransportError, usize)> {
        let mut done = 0;
        while done < bytes.len() {
            match self.interruptible(signal, writer.write(&bytes[done..])).await {
                Ok(Ok(0)) => return Err((TransportError::Closed, done)),
                Ok(Ok(n)) => done += n,
                Ok(Err(e)) => return Err((TransportError::from_io(e), done)),
                Err(e) => return Err((e, done)),
            }
        }
        match self.interruptible(signal, writer.flush()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err((TransportError::from_io(e), done)),
            Err(e) => Err((e, done)),
        }
    }

    /// Finish the partial frame in `rest`, then tell the peer to drop the message.
    ///
    /// Only closing the channel interrupts this.
    async fn abort_slices(
        &self,
        writer: &mut WriteHalf<S>,
        rest: &[u8],
        id: MessageId,
        offset: usize,
    ) -> Result<(), TesseraError> {
        let mut tail = BytesMut::with_capacity(rest.len() + FrameHeader::LEN);
        tail.extend_from_slice(rest);
        self.codec.encode_frame(&FrameHeader::cancel(), &[], &mut tail)?;

        let mut signal = self.signal.subscribe();
        let written = tokio::select! {
            biased;
            _ = signal.wait_for(|s| matches!(s, Signal::Closing | Signal::Closed)) => {
                Err(TransportError::Closed)
            }
            written = async {
                writer.write_all(&tail).await?;
                writer.flush().await
            } => written.map_err(TransportError::from_io),
        };

        match written {
            Ok(()) => tracing::debug!(type_id = %id, offset, "sliced send cancelled"),
            Err(e) => {
                tracing::debug!(type_id = %id, offset, error = %e, "cancel frame not delivered");
            }
        }
        Err(TransportError::Cancelled.into())
    }

    async fn write(
        &self,
        signal: &mut watch::Receiver<Signal>,
        writer: &mut WriteHalf<S>,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        self.interruptible(signal, async {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await?
        .map_err(TransportError::from_io)
    }

    /// Read one envelope.
    ///
    /// The envelope is raw unless `flags.decode` is set. An eagerly decoded
    /// envelope whose type is not registered is returned raw.
    pub async fn recv(&self, flags: RecvFlags) -> Result<Envelope, TesseraError> {
        let _busy = Busy::enter(&self.receiving);
        let mut signal = self.signal.subscribe();

        let mut reader = self.interruptible(&mut signal, self.reader.lock()).await?;
        let (id, payload) = self.read_message(&mut signal, &mut *reader).await?;
        drop(reader);

        let envelope = Envelope::from_raw(id, payload);
        if !flags.decode {
            return Ok(envelope);
        }
        if !self.registry.contains(id) {
            tracing::warn!(type_id = %id, "received unregistered type, leaving it raw");
            return Ok(envelope);
        }

        if flags.offload {
            self.interruptible(&mut signal, worker::decode(self.registry.clone(), envelope))
                .await?
        } else {
            let mut envelope = envelope;
            envelope.decode(&self.registry)?;
            Ok(envelope)
        }
    }

    async fn read_message(
        &self,
        signal: &mut watch::Receiver<Signal>,
        reader: &mut ReadHalf<S>,
    ) -> Result<(MessageId, Vec<u8>), TesseraError> {
        loop {
            let header = self.read_header(signal, reader).await?;
            match header.kind {
                FrameKind::VersionVerification => {
                    let local = self.registry.version();
                    let remote = Version::from_u32(header.data);
                    if local != remote {
                        tracing::warn!(%local, %remote, "registry version mismatch");
                        return Err(TransportError::VersionMismatch {
                            local: local.to_string(),
                            remote: remote.to_string(),
                        }
                        .into());
                    }
                }
                FrameKind::Complete => {
                    let mut payload = Vec::new();
                    self.read_into(signal, reader, &mut payload, header.payload_len())
                        .await?;
                    let id = MessageId::new(header.data);
                    tracing::debug!(type_id = %id, len = payload.len(), "received frame");
                    return Ok((id, payload));
                }
                FrameKind::SliceHeader => {
                    let id = MessageId::new(header.data);
                    let payload = self
                        .read_slices(signal, reader, header.length as usize)
                        .await?;
                    tracing::debug!(type_id = %id, len = payload.len(), "received sliced frame");
                    return Ok((id, payload));
                }
                FrameKind::Cancel => {
                    tracing::debug!("peer cancelled its message");
                    return Err(TransportError::Cancelled.into());
                }
                FrameKind::Slice => {
                    return Err(TransportError::InvalidFrame(
                        "slice frame without a slice header".to_owned(),
                    )
                    .into());
                }
            }
        }
    }

    async fn read_slices(
        &self,
        signal: &mut watch::Receiver<Signal>,
        reader: &mut ReadHalf<S>,
        total: usize,
    ) -> Result<Vec<u8>, TransportError> {
        let mut payload = Vec::with_capacity(total);
        while payload.len() < total {
            let header = self.read_header(signal, reader).await?;
            match header.kind {
                FrameKind::Slice => {
                    let offset = header.data as usize;
                    let len = header.payload_len();
                    if offset != payload.len() || len == 0 || offset + len > total {
                        return Err(TransportError::InvalidFrame(format!(
                            "slice at {offset} of {len} bytes does not continue {} of {total}",
                            payload.len()
                        )));
                    }
                    self.read_into(signal, reader, &mut payload, len).await?;
                }
                FrameKind::Cancel => {
                    tracing::debug!(received = payload.len(), total, "peer cancelled sliced message");
                    return Err(TransportError::Cancelled);
                }
                other => {
                    return Err(TransportError::InvalidFrame(format!(
                        "{other:?} frame inside a sliced message"
                    )));
                }
            }
        }
        Ok(payload)
    }

    async fn read_header(
        &self,
        signal: &mut watch::Receiver<Signal>,
        reader: &mut ReadHalf<S>,
    ) -> Result<FrameHeader, TransportError> {
        let mut raw = [0u8; FrameHeader::LEN];
        self.interruptible(signal, reader.read_exact(&mut raw))
            .await?
            .map_err(TransportError::from_io)?;
        self.codec.decode_header(&raw)
    }

    async fn read_into(
        &self,
        signal: &mut watch::Receiver<Signal>,
        reader: &mut ReadHalf<S>,
        payload: &mut Vec<u8>,
        len: usize,
    ) -> Result<(), TransportError> {
        let start = payload.len();
        payload.resize(start + len, 0);
        self.interruptible(signal, reader.read_exact(&mut payload[start..]))
            .await?
            .map_err(TransportError::from_io)?;
        Ok(())
    }

    /// Shut the stream down.
    ///
    /// In-flight operations fail with `TransportError::Closed`, as does every
    /// later one. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), TesseraError> {
        let started = self.signal.send_if_modified(|signal| match signal {
            Signal::Open | Signal::Cancelled => {
                *signal = Signal::Closing;
                true
            }
            Signal::Closing | Signal::Closed => false,
        });
        if !started {
            return Ok(());
        }

        let result = self.writer.lock().await.shutdown().await;
        self.signal.send_replace(Signal::Closed);
        tracing::debug!("channel closed");

        match result.map_err(TransportError::from_io) {
            Ok(()) | Err(TransportError::Closed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn frame_len(len: usize) -> Result<u32, TransportError> {
    u32::try_from(len).map_err(|_| TransportError::FrameTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

impl<S> Transport for Channel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn send(
        &self,
        envelope: Envelope,
        flags: SendFlags,
    ) -> impl Future<Output = Result<(), TesseraError>> + Send {
        Channel::send(self, envelope, flags)
    }

    fn recv(&self, flags: RecvFlags) -> impl Future<Output = Result<Envelope, TesseraError>> + Send {
        Channel::recv(self, flags)
    }

    fn close(&self) -> impl Future<Output = Result<(), TesseraError>> + Send {
        Channel::close(self)
    }

    fn is_open(&self) -> bool {
        Channel::is_open(self)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tessera_codec::{Binary, Json};
    use tessera_core::{
        node, object, CodecError, Deserializer, ErrorKind, FieldKey, Format, Load, Message, Save,
        Serializer,
    };
    use tokio::io::DuplexStream;

    use super::*;

    const SEQ: FieldKey = FieldKey::new("seq", 0);
    const TEXT: FieldKey = FieldKey::new("text", 1);

    macro_rules! note_message {
        ($name:ident, $wire:literal, $format:ty) => {
            #[derive(Debug, Default, PartialEq)]
            struct $name {
                seq: u32,
                text: String,
            }

            impl Save for $name {
                fn save<S: Serializer>(&self, s: &mut S) -> Result<(), CodecError> {
                    object(s, 2, |s| {
                        s.save_field(SEQ, &self.seq)?;
                        s.save_field(TEXT, &self.text)
                    })
                }
            }

            impl Load for $name {
                fn load<D: Deserializer>(&mut self, d: &mut D) -> Result<(), CodecError> {
                    node(d, |d| {
                        d.load_field(SEQ, &mut self.seq)?;
                        d.load_field(TEXT, &mut self.text)
                    })
                }
            }

            impl Message for $name {
                const NAME: &'static str = $wire;
                type Format = $format;
            }
        };
    }

    note_message!(Note, "test.Note", Json);
    note_message!(Blob, "test.Blob", Binary);
    note_message!(Stray, "test.Stray", Json);

    fn registry(version: Version) -> Arc<TypeRegistry> {
        let mut registry = TypeRegistry::with_version(version);
        registry.register::<Note>().unwrap();
        registry.register::<Blob>().unwrap();
        Arc::new(registry)
    }

    fn pair_with(
        config: ChannelConfig,
        left: Arc<TypeRegistry>,
        right: Arc<TypeRegistry>,
    ) -> (Channel<DuplexStream>, Channel<DuplexStream>) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Channel::with_config(a, left, config.clone()),
            Channel::with_config(b, right, config),
        )
    }

    fn pair() -> (Channel<DuplexStream>, Channel<DuplexStream>) {
        let registry = registry(Version::default());
        pair_with(ChannelConfig::default(), registry.clone(), registry)
    }

    fn note(seq: u32, text: &str) -> Note {
        Note {
            seq,
            text: text.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_send_recv_lazy() {
        let (left, right) = pair();
        left.send(Envelope::new(note(1, "hi")), SendFlags::new())
            .await
            .unwrap();

        let mut envelope = right.recv(RecvFlags::new()).await.unwrap();
        assert!(!envelope.is_decoded());
        assert_eq!(envelope.id(), Note::message_id());
        assert_eq!(envelope.raw(), Some(&br#"{"seq":1,"text":"hi"}"#[..]));

        let registry = right.registry().clone();
        assert_eq!(*envelope.cast::<Note>(&registry).unwrap(), note(1, "hi"));
        assert_eq!(
            envelope.cast::<Blob>(&registry).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[tokio::test]
    async fn test_eager_and_offloaded_decode() {
        let (left, right) = pair();
        left.send(Envelope::new(note(2, "eager")), SendFlags::new().offload(true))
            .await
            .unwrap();
        left.send(Envelope::new(note(3, "worker")), SendFlags::new())
            .await
            .unwrap();

        let first = right.recv(RecvFlags::new().decode(true)).await.unwrap();
        assert_eq!(first.get::<Note>(), Some(&note(2, "eager")));

        let second = right
            .recv(RecvFlags::new().decode(true).offload(true))
            .await
            .unwrap();
        assert_eq!(second.get::<Note>(), Some(&note(3, "worker")));
    }

    #[tokio::test]
    async fn test_unknown_type_stays_raw() {
        let mut sender = TypeRegistry::new();
        sender.register::<Stray>().unwrap();
        let (left, right) = pair_with(
            ChannelConfig::default(),
            Arc::new(sender),
            registry(Version::default()),
        );

        let stray = Stray {
            seq: 9,
            text: "lost".into(),
        };
        left.send(Envelope::new(stray), SendFlags::new()).await.unwrap();

        let mut envelope = right.recv(RecvFlags::new().decode(true)).await.unwrap();
        assert!(!envelope.is_decoded());
        let registry = right.registry().clone();
        assert_eq!(
            envelope.cast::<Stray>(&registry).unwrap_err().kind(),
            ErrorKind::UnknownType
        );
        assert_eq!(
            envelope.cast::<Note>(&registry).unwrap_err().kind(),
            ErrorKind::TypeMismatch
        );
    }

    #[tokio::test]
    async fn test_sliced_send() {
        let config = ChannelConfig::new().slice_size(32);
        let registry = registry(Version::default());
        let (left, right) = pair_with(config, registry.clone(), registry.clone());

        let blob = Blob {
            seq: 4,
            text: "x".repeat(500),
        };
        let expected_len = Binary::encode(&blob).unwrap().len();
        left.send(Envelope::new(blob), SendFlags::new().slice(true))
            .await
            .unwrap();

        let envelope = right.recv(RecvFlags::new()).await.unwrap();
        assert_eq!(envelope.raw().map(<[u8]>::len), Some(expected_len));
        let blob = envelope.into_inner::<Blob>(&registry).unwrap();
        assert_eq!(blob.text.len(), 500);
    }

    #[tokio::test]
    async fn test_version_verification() {
        let (left, right) = pair_with(
            ChannelConfig::default(),
            registry(Version::new(1, 2, 0)),
            registry(Version::new(1, 3, 0)),
        );
        left.send(Envelope::new(note(1, "v")), SendFlags::new())
            .await
            .unwrap();
        left.send(Envelope::new(note(2, "v")), SendFlags::new().verify_version(true))
            .await
            .unwrap();

        assert!(right.recv(RecvFlags::new()).await.is_ok());
        let err = right.recv(RecvFlags::new()).await.unwrap_err();
        assert!(matches!(
            err,
            TesseraError::Transport(TransportError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_frame_too_large() {
        let registry = registry(Version::default());
        let (left, _right) = pair_with(
            ChannelConfig::new().max_frame_size(16),
            registry.clone(),
            registry,
        );
        let err = left
            .send(Envelope::new(note(1, "way past sixteen bytes")), SendFlags::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FrameTooLarge);
    }

    #[tokio::test]
    async fn test_oversized_header_rejected() {
        let registry = registry(Version::default());
        let (mut raw, stream) = tokio::io::duplex(1024);
        let channel = Channel::with_config(
            stream,
            registry,
            ChannelConfig::new().max_frame_size(64),
        );

        let header = FrameHeader::complete(Note::message_id(), u32::MAX);
        raw.write_all(&header.to_bytes()).await.unwrap();

        let err = channel.recv(RecvFlags::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FrameTooLarge);
    }

    #[tokio::test]
    async fn test_peer_cancel_frame() {
        let registry = registry(Version::default());
        let (mut raw, stream) = tokio::io::duplex(1024);
        let channel = Channel::new(stream, registry);

        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec
            .encode_frame(&FrameHeader::slice_header(Note::message_id(), 8), &[], &mut buf)
            .unwrap();
        codec
            .encode_frame(&FrameHeader::slice(0, 4), b"abcd", &mut buf)
            .unwrap();
        codec.encode_frame(&FrameHeader::cancel(), &[], &mut buf).unwrap();
        raw.write_all(&buf).await.unwrap();

        let err = channel.recv(RecvFlags::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    fn blob(len: usize) -> Blob {
        Blob {
            seq: 9,
            text: "x".repeat(len),
        }
    }

    /// Decode frames from `wire`, then from `raw`, until a `last` frame arrives.
    ///
    /// Returns the frame kinds and every byte seen.
    async fn read_frames_until(
        raw: &mut DuplexStream,
        mut wire: Vec<u8>,
        last: FrameKind,
    ) -> (Vec<FrameKind>, Vec<u8>) {
        let codec = FrameCodec::new();
        let mut pending = BytesMut::new();
        pending.extend_from_slice(&wire);
        let mut kinds = Vec::new();
        loop {
            while let Some(frame) = ntex_codec::Decoder::decode(&codec, &mut pending).unwrap() {
                kinds.push(frame.kind());
                if frame.kind() == last {
                    return (kinds, wire);
                }
            }
            let mut chunk = [0u8; 256];
            let n = raw.read(&mut chunk).await.unwrap();
            assert!(n > 0, "stream ended before a {last:?} frame, saw {kinds:?}");
            pending.extend_from_slice(&chunk[..n]);
            wire.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn test_cancelled_sliced_send_emits_cancel_frame() {
        let registry = registry(Version::default());
        let (mut raw, stream) = tokio::io::duplex(64);
        let sender = Arc::new(Channel::with_config(
            stream,
            registry.clone(),
            ChannelConfig::new().slice_size(32),
        ));

        let send = tokio::spawn({
            let sender = sender.clone();
            async move {
                sender
                    .send(Envelope::new(blob(2000)), SendFlags::new().slice(true))
                    .await
            }
        });

        // Let the sender fill the pipe and stall mid-message.
        let mut head = vec![0u8; 100];
        raw.read_exact(&mut head).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(sender.cancel());

        let (kinds, wire) = tokio::time::timeout(
            Duration::from_secs(5),
            read_frames_until(&mut raw, head, FrameKind::Cancel),
        )
        .await
        .unwrap();

        let err = send.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        assert_eq!(kinds.first(), Some(&FrameKind::SliceHeader));
        assert_eq!(kinds.last(), Some(&FrameKind::Cancel));
        assert!(kinds[1..kinds.len() - 1].iter().all(|k| *k == FrameKind::Slice));

        // A receiving channel sees the same bytes as a cancelled message.
        let (mut feed, stream) = tokio::io::duplex(64 * 1024);
        let receiver = Channel::new(stream, registry);
        feed.write_all(&wire).await.unwrap();
        let err = receiver.recv(RecvFlags::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_close_interrupts_stalled_cancel_frame() {
        let registry = registry(Version::default());
        let (_raw, stream) = tokio::io::duplex(64);
        let sender = Arc::new(Channel::with_config(
            stream,
            registry,
            ChannelConfig::new().slice_size(32),
        ));

        let send = tokio::spawn({
            let sender = sender.clone();
            async move {
                sender
                    .send(Envelope::new(blob(2000)), SendFlags::new().slice(true))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The peer never reads, so the cancel frame cannot be written.
        assert!(sender.cancel());
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(5), sender.close())
            .await
            .unwrap()
            .unwrap();
        let err = send.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(sender.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn test_state_tracks_queued_sends() {
        let registry = registry(Version::default());
        let (mut raw, stream) = tokio::io::duplex(64);
        let sender = Arc::new(Channel::new(stream, registry));

        let spawn_send = |seq: u32| {
            let sender = sender.clone();
            tokio::spawn(async move {
                let note = Note {
                    seq,
                    text: "y".repeat(200),
                };
                sender.send(Envelope::new(note), SendFlags::new()).await
            })
        };
        let frame_len = FrameHeader::LEN + Json::encode(&note(1, &"y".repeat(200))).unwrap().len();

        let first = spawn_send(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = spawn_send(2);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Drain the first frame; the second send takes the writer and stalls.
        let mut frame = vec![0u8; frame_len];
        raw.read_exact(&mut frame).await.unwrap();
        first.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sender.state(), ChannelState::Sending);

        raw.read_exact(&mut frame).await.unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(sender.state(), ChannelState::Idle);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_recv() {
        let (_left, right) = pair();
        let right = Arc::new(right);
        let handle = right.cancel_handle();

        let pending = tokio::spawn({
            let right = right.clone();
            async move { right.recv(RecvFlags::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(right.state(), ChannelState::Receiving);

        assert!(handle.cancel());
        let err = pending.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        assert!(!handle.cancel());
        assert_eq!(right.state(), ChannelState::Cancelled);
        let err = right.recv(RecvFlags::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_close_fails_later_operations() {
        let (left, right) = pair();
        assert_eq!(left.state(), ChannelState::Idle);

        left.close().await.unwrap();
        left.close().await.unwrap();
        assert_eq!(left.state(), ChannelState::Closed);
        assert!(!left.is_open());

        let err = left
            .send(Envelope::new(note(1, "late")), SendFlags::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);

        // The peer sees end of stream.
        let err = right.recv(RecvFlags::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportClosed);
    }

    #[tokio::test]
    async fn test_close_unblocks_recv() {
        let (_left, right) = pair();
        let right = Arc::new(right);

        let pending = tokio::spawn({
            let right = right.clone();
            async move { right.recv(RecvFlags::new()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        right.close().await.unwrap();
        let err = pending.await.unwrap().unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_transport_trait() {
        async fn roundtrip<T: Transport>(a: &T, b: &T) -> Result<Envelope, TesseraError> {
            a.send(Envelope::new(note(5, "trait")), SendFlags::new()).await?;
            b.recv(RecvFlags::new().decode(true)).await
        }

        let (left, right) = pair();
        let envelope = roundtrip(&left, &right).await.unwrap();
        assert_eq!(envelope.get::<Note>(), Some(&note(5, "trait")));
        assert!(Transport::is_open(&left));
    }
}
