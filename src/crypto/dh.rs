use super::error::CryptoError;
use crate::constants::{DH_GENERATOR, DH_KEY_LEN, DH_PRIME, DH_PRIVATE_KEY_LEN};
use num_bigint::BigUint;
use rand::Rng as _;
use std::fmt;

fn prime() -> BigUint {
    BigUint::from_bytes_be(&DH_PRIME)
}

/// Encodes `value` as exactly [`DH_KEY_LEN`] big-endian bytes.
///
/// Shorter values are left-padded with zeros; leading zero bytes beyond the
/// width are stripped. Values wider than the group never occur because every
/// value is reduced modulo the prime.
pub fn to_fixed_be(value: &BigUint) -> [u8; DH_KEY_LEN] {
    let bytes = value.to_bytes_be();
    let significant = match bytes.iter().position(|&b| b != 0) {
        Some(first) => &bytes[first..],
        None => &[][..],
    };
    let significant = &significant[significant.len().saturating_sub(DH_KEY_LEN)..];

    let mut out = [0u8; DH_KEY_LEN];
    out[DH_KEY_LEN - significant.len()..].copy_from_slice(significant);
    out
}

/// A public key as sent on the wire: 96 big-endian bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; DH_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; DH_KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: DH_KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; DH_KEY_LEN] {
        &self.0
    }

    fn to_biguint(self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({:02x?}..)", &self.0[..8])
    }
}

/// The agreed secret S, fixed-width big-endian.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret([u8; DH_KEY_LEN]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; DH_KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// A private exponent and its public value `G^x mod P`.
pub struct KeyPair {
    private: BigUint,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a key pair with a random 160-bit private exponent.
    pub fn generate() -> Self {
        let mut bytes = [0u8; DH_PRIVATE_KEY_LEN];
        rand::rng().fill(&mut bytes[..]);
        // A zero exponent would yield the public value 1, which peers reject.
        bytes[DH_PRIVATE_KEY_LEN - 1] |= 0x01;
        Self::from_private_bytes(&bytes)
    }

    /// Builds a key pair from a big-endian private exponent.
    pub fn from_private_bytes(bytes: &[u8]) -> Self {
        let private = BigUint::from_bytes_be(bytes);
        let public = BigUint::from(DH_GENERATOR).modpow(&private, &prime());
        Self {
            private,
            public: PublicKey(to_fixed_be(&public)),
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Computes S = `peer^x mod P`.
    ///
    /// Both ends arrive at the same value because
    /// `(G^a)^b = (G^b)^a mod P`. Degenerate peer values (0, 1, P-1 and
    /// anything not below P) are rejected since they force a predictable S.
    pub fn shared_secret(&self, peer: &PublicKey) -> Result<SharedSecret, CryptoError> {
        let p = prime();
        let y = peer.to_biguint();
        let one = BigUint::from(1u32);

        if y <= one || y >= &p - &one {
            return Err(CryptoError::InvalidPublicKey);
        }

        let secret = y.modpow(&self.private, &p);
        Ok(SharedSecret(to_fixed_be(&secret)))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
