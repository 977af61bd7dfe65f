use super::codec::PeerWireCodec;
use super::error::PeerError;
use super::message::{Handshake, Message};
use super::peer_id::PeerId;
use crate::buffer::{BorrowedBuffer, BufferPool, BufferedPieceRegistry};
use crate::config::TransportConfig;
use crate::constants::{HANDSHAKE_LEN, HANDSHAKE_TIMEOUT, PEER_READ_TIMEOUT, PEER_WRITE_TIMEOUT};
use crate::crypto::CipherSession;
use crate::mse::{CryptoMethod, MseStream, Negotiator};
use crate::pipeline::{CipherMutator, HandlerContext, Pipeline, PipelineError};
use crate::torrent::TorrentId;
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::time::timeout;

/// Read and flush requests raised by the pipeline.
#[derive(Debug, Default)]
struct Signals {
    read: AtomicBool,
    flush: AtomicBool,
}

impl Signals {
    fn take_read(&self) -> bool {
        self.read.swap(false, Ordering::AcqRel)
    }

    fn take_flush(&self) -> bool {
        self.flush.swap(false, Ordering::AcqRel)
    }
}

impl HandlerContext for Signals {
    fn request_read(&self) {
        self.read.store(true, Ordering::Release);
    }

    fn request_flush(&self) {
        self.flush.store(true, Ordering::Release);
    }
}

/// Peer wire messages over a byte stream.
///
/// Socket reads land directly in the pipeline's ring and are decrypted in
/// place when the connection negotiated RC4. Outbound messages are encoded
/// and encrypted into the pipeline's outbound buffer, then written out on
/// [`flush`](Self::flush).
pub struct PeerTransport<S> {
    stream: S,
    pipeline: Pipeline<PeerWireCodec>,
    signals: Arc<Signals>,
    method: CryptoMethod,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl<S> PeerTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// A plaintext transport over a stream with nothing buffered.
    pub fn new(stream: S, config: &TransportConfig) -> Result<Self, PeerError> {
        Self::from_parts(stream, &[], None, config)
    }

    /// Takes over a negotiated channel, including any bytes it read ahead.
    pub fn from_mse(stream: MseStream<S>, config: &TransportConfig) -> Result<Self, PeerError> {
        let (inner, prefix, cipher) = stream.into_parts()?;
        Self::from_parts(inner, &prefix, cipher, config)
    }

    /// Builds a transport from a raw stream, plaintext bytes already read
    /// from it, and the cipher state to continue with.
    pub fn from_parts(
        stream: S,
        prefix: &[u8],
        cipher: Option<CipherSession>,
        config: &TransportConfig,
    ) -> Result<Self, PeerError> {
        Self::with_buffers(
            stream,
            prefix,
            cipher,
            config,
            BorrowedBuffer::standalone(config.inbound_buffer_size),
            BorrowedBuffer::standalone(config.outbound_buffer_size),
        )
    }

    /// Like [`from_parts`](Self::from_parts), with buffers taken from pools.
    pub fn from_pools(
        stream: S,
        prefix: &[u8],
        cipher: Option<CipherSession>,
        config: &TransportConfig,
        inbound: &Arc<BufferPool>,
        outbound: &Arc<BufferPool>,
    ) -> Result<Self, PeerError> {
        Self::with_buffers(stream, prefix, cipher, config, inbound.borrow(), outbound.borrow())
    }

    fn with_buffers(
        stream: S,
        prefix: &[u8],
        cipher: Option<CipherSession>,
        config: &TransportConfig,
        inbound: BorrowedBuffer,
        outbound: BorrowedBuffer,
    ) -> Result<Self, PeerError> {
        let codec = PeerWireCodec::new(config.max_message_size);
        let mut pipeline = Pipeline::new(codec, inbound, outbound);

        let method = match cipher {
            Some(_) => CryptoMethod::Rc4,
            None => CryptoMethod::Plaintext,
        };
        if let Some(cipher) = cipher {
            let (incoming, outgoing) = cipher.into_halves();
            pipeline.push_input_mutator(CipherMutator::new(incoming));
            pipeline.push_output_mutator(CipherMutator::new(outgoing));
        }

        let signals = Arc::new(Signals::default());
        pipeline.bind(signals.clone())?;
        pipeline.push_plaintext(prefix)?;

        Ok(Self {
            stream,
            pipeline,
            signals,
            method,
            read_timeout: PEER_READ_TIMEOUT,
            write_timeout: PEER_WRITE_TIMEOUT,
        })
    }

    /// Parks every received block in `pieces` as well as returning it.
    pub fn with_piece_registry(mut self, pieces: Arc<BufferedPieceRegistry>) -> Self {
        let codec = self.pipeline.codec_mut();
        *codec = codec.clone().with_piece_registry(pieces);
        self
    }

    pub fn set_timeouts(&mut self, read: Duration, write: Duration) {
        self.read_timeout = read;
        self.write_timeout = write;
    }

    /// Encrypts the connection as initiator and exchanges handshakes.
    ///
    /// Our handshake rides in the encryption handshake's initial payload, so
    /// the exchange costs no extra round trip.
    pub async fn establish_outgoing(
        stream: S,
        negotiator: &Negotiator,
        info_hash: TorrentId,
        peer_id: PeerId,
    ) -> Result<(Self, Handshake), PeerError> {
        let ours = Handshake::new(info_hash, peer_id);
        let mut stream = negotiator
            .negotiate_outgoing_with_payload(stream, info_hash, &ours.encode())
            .await?;

        let theirs = read_handshake(&mut stream).await?;
        if theirs.info_hash != info_hash {
            return Err(PeerError::InfoHashMismatch);
        }

        tracing::debug!(peer = ?theirs.peer_id, method = ?stream.method(), "outgoing peer connected");
        Ok((Self::from_mse(stream, negotiator.config())?, theirs))
    }

    /// Accepts an encrypted connection for whichever registered torrent the
    /// peer asks for and exchanges handshakes.
    pub async fn establish_incoming(
        stream: S,
        negotiator: &Negotiator,
        peer_id: PeerId,
    ) -> Result<(Self, Handshake), PeerError> {
        let (mut stream, torrent) = negotiator.negotiate_incoming(stream).await?;

        let theirs = read_handshake(&mut stream).await?;
        if theirs.info_hash != torrent {
            return Err(PeerError::InfoHashMismatch);
        }

        let ours = Handshake::new(torrent, peer_id);
        timeout(HANDSHAKE_TIMEOUT, async {
            stream.write_all(&ours.encode()).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| PeerError::Timeout)??;

        tracing::debug!(peer = ?theirs.peer_id, method = ?stream.method(), "incoming peer connected");
        Ok((Self::from_mse(stream, negotiator.config())?, theirs))
    }

    /// Encodes `message` without writing it, flushing first if the
    /// outbound buffer is full.
    pub async fn queue_message(&mut self, message: &Message) -> Result<(), PeerError> {
        loop {
            if self.pipeline.encode(message)? {
                return Ok(());
            }
            if !self.signals.take_flush() || !self.pipeline.has_pending() {
                return Err(PipelineError::MessageTooLarge {
                    len: message.encoded_len(),
                    max: self.pipeline.outbound_capacity(),
                }
                .into());
            }
            self.flush().await?;
        }
    }

    pub async fn send_message(&mut self, message: &Message) -> Result<(), PeerError> {
        self.queue_message(message).await?;
        self.flush().await
    }

    /// Writes out every pending byte.
    pub async fn flush(&mut self) -> Result<(), PeerError> {
        while self.pipeline.has_pending() {
            let write = poll_fn(|cx| -> Poll<Result<usize, PeerError>> {
                let pending = self.pipeline.pending()?;
                let n = ready!(Pin::new(&mut self.stream).poll_write(cx, &pending))?;
                Poll::Ready(Ok(n))
            });
            let n = timeout(self.write_timeout, write)
                .await
                .map_err(|_| PeerError::Timeout)??;
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero).into());
            }
            self.pipeline.advance_flushed(n);
        }

        timeout(self.write_timeout, self.stream.flush())
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Returns the next message, reading from the stream as needed.
    pub async fn receive_message(&mut self) -> Result<Message, PeerError> {
        loop {
            if let Some(message) = self.pipeline.decode()? {
                return Ok(message);
            }
            if self.signals.take_read() {
                self.fill().await?;
            }
        }
    }

    async fn fill(&mut self) -> Result<(), PeerError> {
        let read = poll_fn(|cx| -> Poll<Result<usize, PeerError>> {
            let mut region = self.pipeline.writable()?;
            let mut buf = ReadBuf::new(region.as_mut_slice());
            ready!(Pin::new(&mut self.stream).poll_read(cx, &mut buf))?;
            let n = buf.filled().len();
            region.commit(n);
            Poll::Ready(Ok(n))
        });

        let n = timeout(self.read_timeout, read)
            .await
            .map_err(|_| PeerError::Timeout)??;
        if n == 0 {
            return Err(PeerError::ConnectionClosed);
        }

        self.pipeline.fire_data_received()?;
        Ok(())
    }

    /// Whether messages travel RC4-encrypted or as plaintext.
    pub fn encryption(&self) -> CryptoMethod {
        self.method
    }

    pub fn pipeline(&self) -> &Pipeline<PeerWireCodec> {
        &self.pipeline
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

async fn read_handshake<S>(stream: &mut MseStream<S>) -> Result<Handshake, PeerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = [0u8; HANDSHAKE_LEN];
    match timeout(HANDSHAKE_TIMEOUT, stream.read_exact(&mut buf)).await {
        Err(_) => Err(PeerError::Timeout),
        Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Err(PeerError::ConnectionClosed),
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(_)) => Handshake::decode(&buf),
    }
}
