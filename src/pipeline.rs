//! Ring-buffer message pipeline.
//!
//! A [`Pipeline`] sits between a socket adapter and the application. The
//! adapter reads raw bytes straight into the pipeline's inbound ring and
//! signals [`Pipeline::fire_data_received`]; the pipeline runs its input
//! [`MutatorChain`] (typically an RC4 decryptor) over exactly the new bytes,
//! then asks its [`MessageCodec`] for as many complete messages as the ring
//! holds. Outbound messages are encoded into a second buffer and run through
//! the output mutators before the adapter writes them out.
//!
//! The inbound ring never copies bytes to make room: when a message would
//! run past the end of the arena, new bytes wrap to the front and the codec
//! sees both pieces through a [`SplicedView`].
//!
//! # Examples
//!
//! ```
//! use rbit_transport::pipeline::{
//!     Decoded, HandlerContext, MessageCodec, Pipeline, PipelineError, SplicedView,
//! };
//! use std::sync::Arc;
//!
//! /// One length byte followed by that many bytes.
//! struct Short;
//!
//! impl MessageCodec for Short {
//!     type Message = Vec<u8>;
//!
//!     fn decode(&mut self, view: &SplicedView<'_>) -> Result<Decoded<Vec<u8>>, PipelineError> {
//!         let Some(len) = view.get(0).map(usize::from) else {
//!             return Ok(Decoded::NeedMore);
//!         };
//!         match view.to_bytes(1, len) {
//!             Some(body) => Ok(Decoded::Message { consumed: 1 + len, message: body.to_vec() }),
//!             None => Ok(Decoded::NeedMore),
//!         }
//!     }
//!
//!     fn encode(&mut self, msg: &Vec<u8>, out: &mut [u8]) -> Result<Option<usize>, PipelineError> {
//!         if out.len() < 1 + msg.len() {
//!             return Ok(None);
//!         }
//!         out[0] = msg.len() as u8;
//!         out[1..1 + msg.len()].copy_from_slice(msg);
//!         Ok(Some(1 + msg.len()))
//!     }
//! }
//!
//! struct Idle;
//!
//! impl HandlerContext for Idle {
//!     fn request_read(&self) {}
//!     fn request_flush(&self) {}
//! }
//!
//! # fn main() -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::with_capacity(Short, 64, 64);
//! pipeline.bind(Arc::new(Idle))?;
//!
//! assert!(pipeline.encode(&b"hi".to_vec())?);
//! let wire = pipeline.pending()?.to_vec();
//! pipeline.advance_flushed(wire.len());
//!
//! pipeline.push_plaintext(&wire)?;
//! assert_eq!(pipeline.decode()?, Some(b"hi".to_vec()));
//! assert_eq!(pipeline.decode()?, None);
//! # Ok(())
//! # }
//! ```

mod codec;
mod context;
mod error;
mod mutator;
mod outbound;
mod ring;
mod view;

pub use codec::{Decoded, MessageCodec};
pub use context::HandlerContext;
pub use error::PipelineError;
pub use mutator::{BufferMutator, CipherMutator, MutatorChain};
pub use outbound::{OutboundBuffer, PendingBytes};
pub use ring::{RingBuffer, RingState};
pub use view::SplicedView;

use crate::buffer::{BorrowedBuffer, BufferGuard};
use std::collections::VecDeque;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Inbound and outbound framing for one connection.
///
/// Every call that touches a buffer takes its lock once and releases it
/// before returning. The pipeline must be [bound](Self::bind) to a
/// [`HandlerContext`] before messages can be decoded or encoded.
pub struct Pipeline<C: MessageCodec> {
    codec: C,
    inbound: BorrowedBuffer,
    ring: RingBuffer,
    outbound: OutboundBuffer,
    input: MutatorChain,
    output: MutatorChain,
    queue: VecDeque<C::Message>,
    context: Option<Arc<dyn HandlerContext>>,
}

impl<C: MessageCodec> Pipeline<C> {
    pub fn new(codec: C, inbound: BorrowedBuffer, outbound: BorrowedBuffer) -> Self {
        Self {
            codec,
            ring: RingBuffer::new(inbound.capacity()),
            inbound,
            outbound: OutboundBuffer::new(outbound),
            input: MutatorChain::new(),
            output: MutatorChain::new(),
            queue: VecDeque::new(),
            context: None,
        }
    }

    /// A pipeline over freshly allocated buffers outside any pool.
    pub fn with_capacity(codec: C, inbound: usize, outbound: usize) -> Self {
        Self::new(
            codec,
            BorrowedBuffer::standalone(inbound),
            BorrowedBuffer::standalone(outbound),
        )
    }

    /// Attaches the socket adapter's callbacks. Only one binding is allowed.
    pub fn bind(&mut self, context: Arc<dyn HandlerContext>) -> Result<(), PipelineError> {
        if self.context.is_some() {
            return Err(PipelineError::AlreadyBound);
        }
        self.context = Some(context);
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.context.is_some()
    }

    /// Adds a transform applied to inbound bytes before decoding.
    pub fn push_input_mutator(&mut self, mutator: impl BufferMutator + 'static) {
        self.input.push(mutator);
    }

    /// Adds a transform applied to outbound bytes after encoding.
    pub fn push_output_mutator(&mut self, mutator: impl BufferMutator + 'static) {
        self.output.push(mutator);
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    pub fn ring_state(&self) -> RingState {
        self.ring.state()
    }

    /// Number of decoded messages waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Takes the next decoded message.
    ///
    /// When the queue is empty, asks the context for a read and returns
    /// `None`.
    pub fn decode(&mut self) -> Result<Option<C::Message>, PipelineError> {
        let context = self.context.as_deref().ok_or(PipelineError::NotBound)?;
        match self.queue.pop_front() {
            Some(message) => Ok(Some(message)),
            None => {
                context.request_read();
                Ok(None)
            }
        }
    }

    /// Encodes `message` into the outbound buffer.
    ///
    /// Returns false, and asks the context for a flush, if it does not fit;
    /// the caller retries after flushing.
    pub fn encode(&mut self, message: &C::Message) -> Result<bool, PipelineError> {
        let context = self.context.as_deref().ok_or(PipelineError::NotBound)?;
        let codec = &mut self.codec;
        let output = &mut self.output;

        let appended = self.outbound.append(|out| {
            let written = codec.encode(message, out)?;
            if let Some(n) = written {
                output.apply(&mut out[..n]);
            }
            Ok(written)
        })?;

        if !appended {
            tracing::trace!(
                pending = self.outbound.pending_len(),
                "outbound buffer full, requesting flush"
            );
            context.request_flush();
        }
        Ok(appended)
    }

    /// Locks the inbound arena and exposes the space the next read may fill.
    pub fn writable(&mut self) -> Result<WritableRegion<'_>, PipelineError> {
        let range = self.ring.writable();
        Ok(WritableRegion {
            guard: self.inbound.lock()?,
            ring: &mut self.ring,
            range,
        })
    }

    /// Mutates and decodes bytes committed since the last call. Returns the
    /// number of messages added to the queue.
    pub fn fire_data_received(&mut self) -> Result<usize, PipelineError> {
        let mut arena = self.inbound.lock()?;
        let decoded = self.ring.process(
            &mut arena,
            &mut self.input,
            &mut self.codec,
            &mut self.queue,
        )?;
        if decoded > 0 {
            tracing::trace!(decoded, buffered = self.ring.buffered(), "decoded messages");
        }
        Ok(decoded)
    }

    /// Feeds bytes that are already in plaintext, such as data that arrived
    /// during the encryption handshake. The input mutators skip them.
    pub fn push_plaintext(&mut self, mut data: &[u8]) -> Result<usize, PipelineError> {
        let mut decoded = 0;
        while !data.is_empty() {
            let mut arena = self.inbound.lock()?;
            let range = self.ring.writable();
            let n = range.len().min(data.len());
            if n == 0 {
                return Err(PipelineError::BufferFull {
                    capacity: self.ring.capacity(),
                });
            }

            arena[range.start..range.start + n].copy_from_slice(&data[..n]);
            self.ring.commit_mutated(n);
            decoded += self.ring.process(
                &mut arena,
                &mut self.input,
                &mut self.codec,
                &mut self.queue,
            )?;
            data = &data[n..];
        }
        Ok(decoded)
    }

    pub fn has_pending(&self) -> bool {
        self.outbound.has_pending()
    }

    pub fn outbound_capacity(&self) -> usize {
        self.outbound.capacity()
    }

    /// Locks and exposes encoded bytes not yet written to the socket.
    pub fn pending(&self) -> Result<PendingBytes<'_>, PipelineError> {
        self.outbound.pending()
    }

    /// Marks `n` pending bytes as written.
    pub fn advance_flushed(&mut self, n: usize) {
        self.outbound.advance_flushed(n);
    }
}

impl<C: MessageCodec> fmt::Debug for Pipeline<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("ring", &self.ring.state())
            .field("queued", &self.queue.len())
            .field("outbound_pending", &self.outbound.pending_len())
            .field("bound", &self.context.is_some())
            .finish()
    }
}

/// Free inbound space, locked until committed or dropped.
pub struct WritableRegion<'a> {
    guard: BufferGuard<'a>,
    ring: &'a mut RingBuffer,
    range: Range<usize>,
}

impl WritableRegion<'_> {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.guard[self.range.clone()]
    }

    /// Records that the first `n` bytes were filled.
    pub fn commit(self, n: usize) {
        self.ring.commit(n.min(self.range.len()));
    }
}
