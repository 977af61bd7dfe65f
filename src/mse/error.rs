use super::policy::EncryptionPolicy;
use super::state::HandshakeState;
use crate::crypto::CryptoError;
use crate::reader::ReadError;
use thiserror::Error;

/// Errors that abort an encryption handshake.
///
/// Every variant is fatal to the connection attempt; retrying is up to the
/// caller.
#[derive(Debug, Error)]
pub enum MseError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A bounded read failed (timeout, excess data, sync failure, closed stream).
    #[error("read failed: {0}")]
    Read(#[from] ReadError),

    /// The peer's public key was malformed or degenerate.
    #[error("key exchange failed: {0}")]
    Crypto(#[from] CryptoError),

    /// The decrypted verification constant was not all zeros.
    #[error("invalid verification constant")]
    InvalidVerificationConstant,

    /// No active torrent matched the peer's selector hash.
    #[error("unsupported torrent")]
    UnsupportedTorrent,

    /// The peer's offer has nothing in common with the local policy.
    #[error("no common encryption method: local policy {local:?}, peer offered {offered:#04x}")]
    PolicyMismatch {
        local: EncryptionPolicy,
        offered: u32,
    },

    /// crypto_select did not name exactly one method.
    #[error("invalid crypto_select: {0:#010x}")]
    InvalidCryptoSelect(u32),

    /// A padding length field exceeded 512.
    #[error("padding too long: {0}")]
    PaddingTooLong(usize),

    /// The initial payload does not fit its 16-bit length field.
    #[error("initial payload too long: {0}")]
    PayloadTooLong(usize),

    /// The handshake attempted an out-of-order step.
    #[error("invalid handshake transition from {from:?} to {to:?}")]
    InvalidState {
        from: HandshakeState,
        to: HandshakeState,
    },
}

impl MseError {
    /// Returns true if the peer was too slow or never sent the expected marker.
    pub fn is_timing_failure(&self) -> bool {
        matches!(self, MseError::Read(e) if e.is_timing_failure())
    }

    /// Returns true if the peer closed the connection mid-handshake.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, MseError::Read(ReadError::EndOfStream { .. }))
    }
}
