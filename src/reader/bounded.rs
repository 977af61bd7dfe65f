use super::error::ReadError;
use super::pattern::PatternScanner;
use crate::constants::READ_POLL_INTERVAL;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{sleep_until, timeout_at, Instant};

/// Where a synchronization pattern was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch {
    /// Total bytes placed in the buffer, possibly past the pattern.
    pub read: usize,
    /// Offset of the first pattern byte in the buffer.
    pub position: usize,
}

impl PatternMatch {
    /// Offset of the first byte following the pattern.
    pub fn end(&self, pattern_len: usize) -> usize {
        self.position + pattern_len
    }
}

/// Reads between `min` and `max` bytes before a deadline.
///
/// The deadline covers the whole call, not each individual read. The
/// destination buffer may be larger than `max`; a peer that fills it past
/// `max` fails the read with [`ReadError::ExcessiveData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedReader {
    min: usize,
    max: usize,
    timeout: Duration,
}

impl BoundedReader {
    pub fn new(min: usize, max: usize, timeout: Duration) -> Self {
        debug_assert!(min <= max, "min {} > max {}", min, max);
        Self { min, max, timeout }
    }

    /// A reader for exactly `len` bytes.
    pub fn exact(len: usize, timeout: Duration) -> Self {
        Self::new(len, len, timeout)
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Reads until at least `min` bytes are in `buf`.
    ///
    /// Returns the number of bytes read, which may exceed `min` if the peer
    /// delivered more in the same burst.
    pub async fn read<R>(&self, reader: &mut R, buf: &mut [u8]) -> Result<usize, ReadError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if buf.len() < self.min {
            return Err(ReadError::BufferTooSmall {
                len: buf.len(),
                min: self.min,
            });
        }

        let deadline = Instant::now() + self.timeout;
        let mut total = 0;

        while total < self.min {
            let n = match read_once(reader, &mut buf[total..], deadline).await? {
                Some(n) => n,
                None => {
                    return Err(ReadError::InsufficientData {
                        read: total,
                        min: self.min,
                    })
                }
            };
            if n == 0 {
                return Err(ReadError::EndOfStream {
                    read: total,
                    min: self.min,
                });
            }

            total += n;
            if total > self.max {
                return Err(ReadError::ExcessiveData {
                    read: total,
                    max: self.max,
                });
            }
        }

        Ok(total)
    }

    /// Reads until `pattern` appears within the first `max` bytes of `buf`.
    ///
    /// Bytes already present in `buf[..filled]` are scanned first. Bytes that
    /// arrive after the pattern stay in `buf` and are counted in
    /// [`PatternMatch::read`].
    pub async fn read_until<R>(
        &self,
        reader: &mut R,
        buf: &mut [u8],
        filled: usize,
        pattern: &[u8],
    ) -> Result<PatternMatch, ReadError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let deadline = Instant::now() + self.timeout;
        let mut scanner = PatternScanner::new(pattern);
        let mut total = filled.min(buf.len());

        loop {
            if let Some(position) = scanner.scan(&buf[..total.min(self.max)]) {
                tracing::trace!("pattern found at offset {} after {} bytes", position, total);
                return Ok(PatternMatch {
                    read: total,
                    position,
                });
            }
            if total >= self.max || total == buf.len() {
                return Err(ReadError::SyncFailure { read: total });
            }

            let n = match read_once(reader, &mut buf[total..], deadline).await? {
                Some(n) => n,
                None => return Err(ReadError::SyncFailure { read: total }),
            };
            if n == 0 {
                return Err(ReadError::EndOfStream {
                    read: total,
                    min: self.min,
                });
            }
            total += n;
        }
    }
}

/// Performs one read attempt, returning `None` once the deadline passes.
///
/// Channels that report `WouldBlock` are retried after a short sleep.
async fn read_once<R>(
    reader: &mut R,
    dst: &mut [u8],
    deadline: Instant,
) -> Result<Option<usize>, ReadError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    loop {
        match timeout_at(deadline, reader.read(dst)).await {
            Err(_) => return Ok(None),
            Ok(Ok(n)) => return Ok(Some(n)),
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                let wake = Instant::now() + READ_POLL_INTERVAL;
                if wake >= deadline {
                    sleep_until(deadline).await;
                    return Ok(None);
                }
                sleep_until(wake).await;
            }
            Ok(Err(e)) => return Err(e.into()),
        }
    }
}
