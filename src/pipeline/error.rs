use crate::buffer::Released;
use thiserror::Error;

/// Errors raised while framing messages.
///
/// Running out of outbound space is not an error; `encode` reports it by
/// returning `false`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The codec claimed zero bytes or more bytes than were available.
    #[error("codec consumed {consumed} of {available} available bytes")]
    ProtocolViolation { consumed: usize, available: usize },

    /// The inbound ring holds only a partial message and has no free space.
    #[error("inbound buffer full ({capacity} bytes) without a complete message")]
    BufferFull { capacity: usize },

    /// `decode` or `encode` was called before `bind`.
    #[error("pipeline not bound to a handler context")]
    NotBound,

    #[error("pipeline already bound to a handler context")]
    AlreadyBound,

    #[error(transparent)]
    Released(#[from] Released),

    /// A framed message announced a length above the configured limit.
    #[error("message of {len} bytes exceeds limit of {max}")]
    MessageTooLarge { len: usize, max: usize },

    /// The codec rejected the bytes it was given.
    #[error("codec error: {0}")]
    Codec(String),
}
