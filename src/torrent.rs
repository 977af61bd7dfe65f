//! Torrent identity.
//!
//! A [`TorrentId`] is the 20-byte v1 info hash. During an encrypted handshake
//! it doubles as the selector (SKEY) that lets a receiver find the torrent an
//! initiator is asking for without the hash appearing on the wire.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TorrentIdError {
    #[error("invalid torrent id length: {0}")]
    InvalidLength(usize),

    #[error("invalid hex in torrent id")]
    InvalidHex,
}

/// The 20-byte identifier of a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TorrentId(pub [u8; 20]);

impl TorrentId {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TorrentIdError> {
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| TorrentIdError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self, TorrentIdError> {
        let bytes = hex_decode(s).ok_or(TorrentIdError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl From<[u8; 20]> for TorrentId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TorrentId({})", self.to_hex())
    }
}

impl fmt::Display for TorrentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
        s
    })
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id = TorrentId::from_hex(hex).unwrap();
        assert_eq!(id.to_hex(), hex);
        assert_eq!(id.to_string(), hex);
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(
            TorrentId::from_hex("abc"),
            Err(TorrentIdError::InvalidHex)
        ));
        assert!(matches!(
            TorrentId::from_hex("zz23456789abcdef0123456789abcdef01234567"),
            Err(TorrentIdError::InvalidHex)
        ));
        assert!(matches!(
            TorrentId::from_bytes(&[0u8; 32]),
            Err(TorrentIdError::InvalidLength(32))
        ));
    }
}
