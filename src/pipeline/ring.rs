use super::codec::{Decoded, MessageCodec};
use super::error::PipelineError;
use super::mutator::MutatorChain;
use super::view::SplicedView;
use std::collections::VecDeque;
use std::ops::Range;

/// Cursor snapshot of a [`RingBuffer`], comparable across instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingState {
    /// Start of region A's unconsumed bytes.
    pub decoded_offset: usize,
    /// End of region A's mutated bytes.
    pub undecoded_offset: usize,
    /// End of region A.
    pub undecoded_limit: usize,
    /// `(limit, mutated)` of region B, which always starts at offset 0.
    pub region_b: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RegionB {
    limit: usize,
    mutated: usize,
}

/// Cursors over a fixed arena holding inbound bytes.
///
/// Region A is `[decoded_offset, undecoded_limit)`. When the free space
/// in front of A outgrows the space behind it, new bytes wrap into region B
/// at the start of the arena. B exists only while A holds unconsumed bytes,
/// and becomes the new A the moment A is consumed. Decoding reads A's tail
/// and B as one [`SplicedView`].
///
/// The arena itself is passed into each call so the caller controls locking.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    capacity: usize,
    decoded: usize,
    mutated: usize,
    limit: usize,
    b: Option<RegionB>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            decoded: 0,
            mutated: 0,
            limit: 0,
            b: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> RingState {
        RingState {
            decoded_offset: self.decoded,
            undecoded_offset: self.mutated,
            undecoded_limit: self.limit,
            region_b: self.b.map(|b| (b.limit, b.mutated)),
        }
    }

    /// Bytes received but not yet consumed into messages.
    pub fn buffered(&self) -> usize {
        (self.limit - self.decoded) + self.b.map_or(0, |b| b.limit)
    }

    /// Where the next read may land.
    pub fn writable(&self) -> Range<usize> {
        match self.b {
            Some(b) => b.limit..self.decoded,
            None => self.limit..self.capacity,
        }
    }

    /// Records `n` bytes written at the start of [`writable`](Self::writable).
    pub fn commit(&mut self, n: usize) {
        match self.b.as_mut() {
            Some(b) => b.limit += n,
            None => self.limit += n,
        }
    }

    /// Records `n` bytes written that must bypass the mutators.
    ///
    /// Bytes still waiting for the mutators keep them from being skipped; in
    /// that case this behaves like [`commit`](Self::commit).
    pub fn commit_mutated(&mut self, n: usize) {
        let clean = match self.b {
            Some(b) => b.mutated == b.limit,
            None => self.mutated == self.limit,
        };
        self.commit(n);
        if !clean {
            return;
        }
        match self.b.as_mut() {
            Some(b) => b.mutated = b.limit,
            None => self.mutated = self.limit,
        }
    }

    /// Mutates newly written bytes, then decodes every complete message into
    /// `queue`. Returns how many messages were decoded.
    pub fn process<C>(
        &mut self,
        arena: &mut [u8],
        mutators: &mut MutatorChain,
        codec: &mut C,
        queue: &mut VecDeque<C::Message>,
    ) -> Result<usize, PipelineError>
    where
        C: MessageCodec,
    {
        debug_assert!(arena.len() >= self.capacity);

        match self.b.as_mut() {
            Some(b) => {
                mutators.apply(&mut arena[b.mutated..b.limit]);
                b.mutated = b.limit;
            }
            None => {
                mutators.apply(&mut arena[self.mutated..self.limit]);
                self.mutated = self.limit;
            }
        }

        let mut decoded = 0;
        loop {
            let tail = self.b.map_or(0, |b| b.mutated);
            let view = SplicedView::new(&arena[self.decoded..self.mutated], &arena[..tail]);
            let available = view.len();
            if available == 0 {
                break;
            }

            match codec.decode(&view)? {
                Decoded::NeedMore => break,
                Decoded::Message { consumed, message } => {
                    if consumed == 0 || consumed > available {
                        tracing::debug!(consumed, available, "codec overran its view");
                        return Err(PipelineError::ProtocolViolation {
                            consumed,
                            available,
                        });
                    }
                    self.consume(consumed);
                    queue.push_back(message);
                    decoded += 1;
                }
            }
        }

        self.settle();

        if self.writable().is_empty() {
            return Err(PipelineError::BufferFull {
                capacity: self.capacity,
            });
        }
        Ok(decoded)
    }

    fn consume(&mut self, n: usize) {
        let head = self.mutated - self.decoded;
        if n < head {
            self.decoded += n;
            return;
        }

        match self.b.take() {
            Some(b) => {
                tracing::trace!(limit = b.limit, "promoting region B");
                self.decoded = n - head;
                self.mutated = b.mutated;
                self.limit = b.limit;
            }
            None => self.decoded += n,
        }
        if self.decoded == self.limit {
            self.reset();
        }
    }

    fn reset(&mut self) {
        self.decoded = 0;
        self.mutated = 0;
        self.limit = 0;
    }

    fn settle(&mut self) {
        if self.b.is_some() {
            return;
        }
        if self.decoded == self.limit {
            self.reset();
            return;
        }

        let before = self.decoded;
        let after = self.capacity - self.limit;
        if before > after {
            tracing::trace!(before, after, "opening region B");
            self.b = Some(RegionB {
                limit: 0,
                mutated: 0,
            });
        }
    }
}
