//! Key agreement and keystreams for message stream encryption.
//!
//! - [`KeyPair`] / [`PublicKey`] / [`SharedSecret`]: key exchange in the
//!   fixed 768-bit MSE group, with fixed-width big-endian encodings.
//! - [`Keystream`] / [`CipherSession`]: RC4 keystreams keyed from SHA-1
//!   digests of the shared secret and the torrent selector, with the first
//!   1024 bytes discarded.
//!
//! The obfuscation this provides hides protocol headers from traffic
//! shapers. It does not authenticate peers and is not a security boundary.
//!
//! # Examples
//!
//! ```
//! use rbit_transport::crypto::{CipherSession, KeyPair, Role};
//!
//! let alice = KeyPair::generate();
//! let bob = KeyPair::generate();
//!
//! let s1 = alice.shared_secret(bob.public_key()).unwrap();
//! let s2 = bob.shared_secret(alice.public_key()).unwrap();
//! assert_eq!(s1, s2);
//!
//! let skey = [7u8; 20];
//! let mut a = CipherSession::new(&s1, &skey, Role::Initiator);
//! let mut b = CipherSession::new(&s2, &skey, Role::Receiver);
//!
//! let mut data = *b"hello";
//! a.encrypt(&mut data);
//! b.decrypt(&mut data);
//! assert_eq!(&data, b"hello");
//! ```

mod dh;
mod error;
mod keystream;

pub use dh::{to_fixed_be, KeyPair, PublicKey, SharedSecret};
pub use error::CryptoError;
pub use keystream::{CipherSession, Keystream};

use crate::constants::HASH_LEN;
use sha1::{Digest, Sha1};

/// Which end of the connection we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The side that opened the connection.
    Initiator,
    /// The side that accepted it.
    Receiver,
}

/// SHA-1 over the concatenation of `parts`.
pub fn hash(parts: &[&[u8]]) -> [u8; HASH_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

#[cfg(test)]
mod tests;
