use thiserror::Error;

/// Errors produced by bounded reads.
#[derive(Debug, Error)]
pub enum ReadError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The deadline elapsed before the minimum was read.
    #[error("insufficient data: read {read} of at least {min} bytes before the deadline")]
    InsufficientData { read: usize, min: usize },

    /// The peer sent more than the step allows.
    #[error("excessive data: read {read} bytes, at most {max} allowed")]
    ExcessiveData { read: usize, max: usize },

    /// The channel was closed before the minimum was read.
    #[error("end of stream after {read} of at least {min} bytes")]
    EndOfStream { read: usize, min: usize },

    /// The synchronization pattern did not appear within the allowed bytes.
    #[error("failed to synchronize after {read} bytes")]
    SyncFailure { read: usize },

    /// The destination buffer cannot hold the minimum.
    #[error("buffer of {len} bytes cannot hold {min} bytes")]
    BufferTooSmall { len: usize, min: usize },
}

impl ReadError {
    /// Returns true if the peer was too slow or never produced the expected bytes.
    pub fn is_timing_failure(&self) -> bool {
        matches!(
            self,
            ReadError::InsufficientData { .. } | ReadError::SyncFailure { .. }
        )
    }
}
