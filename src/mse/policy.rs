use super::error::MseError;
use crate::constants::{CRYPTO_PLAINTEXT, CRYPTO_RC4};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stream treatment after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptoMethod {
    /// The rest of the stream is sent in the clear.
    Plaintext,
    /// The rest of the stream is RC4-encrypted.
    Rc4,
}

impl CryptoMethod {
    /// The bit this method occupies in crypto_provide / crypto_select.
    pub fn bit(self) -> u32 {
        match self {
            CryptoMethod::Plaintext => CRYPTO_PLAINTEXT,
            CryptoMethod::Rc4 => CRYPTO_RC4,
        }
    }

    /// Parses a crypto_select field, which must name exactly one method.
    pub fn from_select(select: u32) -> Option<Self> {
        match select {
            CRYPTO_PLAINTEXT => Some(CryptoMethod::Plaintext),
            CRYPTO_RC4 => Some(CryptoMethod::Rc4),
            _ => None,
        }
    }
}

/// The local stance on encrypted connections.
///
/// | local \ peer offers | plaintext | both | encrypted |
/// |---|---|---|---|
/// | `RequirePlaintext` | plaintext | plaintext | fail |
/// | `PreferPlaintext` | plaintext | plaintext | encrypted |
/// | `PreferEncrypted` | plaintext | encrypted | encrypted |
/// | `RequireEncrypted` | fail | encrypted | encrypted |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionPolicy {
    RequirePlaintext,
    PreferPlaintext,
    #[default]
    PreferEncrypted,
    RequireEncrypted,
}

impl EncryptionPolicy {
    pub const ALL: [EncryptionPolicy; 4] = [
        EncryptionPolicy::RequirePlaintext,
        EncryptionPolicy::PreferPlaintext,
        EncryptionPolicy::PreferEncrypted,
        EncryptionPolicy::RequireEncrypted,
    ];

    /// The crypto_provide bitmask advertised under this policy.
    pub fn crypto_provide(self) -> u32 {
        match self {
            EncryptionPolicy::RequirePlaintext => CRYPTO_PLAINTEXT,
            EncryptionPolicy::PreferPlaintext | EncryptionPolicy::PreferEncrypted => {
                CRYPTO_PLAINTEXT | CRYPTO_RC4
            }
            EncryptionPolicy::RequireEncrypted => CRYPTO_RC4,
        }
    }

    /// Whether a method chosen by the peer is acceptable.
    pub fn accepts(self, method: CryptoMethod) -> bool {
        self.crypto_provide() & method.bit() != 0
    }

    /// Picks the method for a peer's crypto_provide bitmask.
    ///
    /// Only the low byte of `offered` carries meaning.
    pub fn select(self, offered: u32) -> Result<CryptoMethod, MseError> {
        let plain = offered & CRYPTO_PLAINTEXT != 0;
        let rc4 = offered & CRYPTO_RC4 != 0;

        let method = match self {
            EncryptionPolicy::RequirePlaintext => plain.then_some(CryptoMethod::Plaintext),
            EncryptionPolicy::PreferPlaintext => {
                if plain {
                    Some(CryptoMethod::Plaintext)
                } else {
                    rc4.then_some(CryptoMethod::Rc4)
                }
            }
            EncryptionPolicy::PreferEncrypted => {
                if rc4 {
                    Some(CryptoMethod::Rc4)
                } else {
                    plain.then_some(CryptoMethod::Plaintext)
                }
            }
            EncryptionPolicy::RequireEncrypted => rc4.then_some(CryptoMethod::Rc4),
        };

        method.ok_or(MseError::PolicyMismatch {
            local: self,
            offered,
        })
    }
}

#[derive(Debug, Error)]
#[error("unknown encryption policy: {0}")]
pub struct ParsePolicyError(String);

impl FromStr for EncryptionPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "require_plaintext" => Ok(EncryptionPolicy::RequirePlaintext),
            "prefer_plaintext" => Ok(EncryptionPolicy::PreferPlaintext),
            "prefer_encrypted" => Ok(EncryptionPolicy::PreferEncrypted),
            "require_encrypted" => Ok(EncryptionPolicy::RequireEncrypted),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for EncryptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncryptionPolicy::RequirePlaintext => "require_plaintext",
            EncryptionPolicy::PreferPlaintext => "prefer_plaintext",
            EncryptionPolicy::PreferEncrypted => "prefer_encrypted",
            EncryptionPolicy::RequireEncrypted => "require_encrypted",
        };
        f.write_str(name)
    }
}
