use super::error::PipelineError;
use crate::buffer::{BorrowedBuffer, BufferGuard};
use std::ops::{Deref, Range};

/// Encoded bytes waiting to be written to the socket.
///
/// `[flushed, written)` is pending; `[written, capacity)` is free.
#[derive(Debug)]
pub struct OutboundBuffer {
    buffer: BorrowedBuffer,
    flushed: usize,
    written: usize,
}

impl OutboundBuffer {
    pub fn new(buffer: BorrowedBuffer) -> Self {
        Self {
            buffer,
            flushed: 0,
            written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn pending_len(&self) -> usize {
        self.written - self.flushed
    }

    pub fn has_pending(&self) -> bool {
        self.written > self.flushed
    }

    /// Runs `write` over the free space; it returns how many bytes it wrote
    /// at the front, or `None` if they did not fit.
    ///
    /// On `None`, already-flushed space is reclaimed and `write` is retried
    /// once. Returns whether the bytes were appended.
    pub fn append<F>(&mut self, mut write: F) -> Result<bool, PipelineError>
    where
        F: FnMut(&mut [u8]) -> Result<Option<usize>, PipelineError>,
    {
        let mut guard = self.buffer.lock()?;

        if self.flushed == self.written {
            self.flushed = 0;
            self.written = 0;
        }

        if let Some(n) = write(&mut guard[self.written..])? {
            self.written += n;
            return Ok(true);
        }
        if self.flushed == 0 {
            return Ok(false);
        }

        guard.copy_within(self.flushed..self.written, 0);
        self.written -= self.flushed;
        self.flushed = 0;

        match write(&mut guard[self.written..])? {
            Some(n) => {
                self.written += n;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Locks and exposes the pending bytes.
    pub fn pending(&self) -> Result<PendingBytes<'_>, PipelineError> {
        Ok(PendingBytes {
            guard: self.buffer.lock()?,
            range: self.flushed..self.written,
        })
    }

    /// Marks `n` pending bytes as written to the socket.
    pub fn advance_flushed(&mut self, n: usize) {
        self.flushed = (self.flushed + n).min(self.written);
        if self.flushed == self.written {
            self.flushed = 0;
            self.written = 0;
        }
    }
}

/// Pending outbound bytes, locked for the guard's lifetime.
pub struct PendingBytes<'a> {
    guard: BufferGuard<'a>,
    range: Range<usize>,
}

impl Deref for PendingBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard[self.range.clone()]
    }
}
