use super::dh::SharedSecret;
use super::{hash, Role};
use crate::constants::KEYSTREAM_DISCARD;
use rc4::consts::U20;
use rc4::{KeyInit, Rc4, StreamCipher};
use std::fmt;

/// One direction of an RC4 stream, already advanced past the discarded prefix.
pub struct Keystream {
    rc4: Rc4<U20>,
}

impl Keystream {
    /// Keys a stream with `SHA1(label ‖ S ‖ SKEY)` and drops its first 1024 bytes.
    pub fn derive(label: &[u8], secret: &SharedSecret, skey: &[u8]) -> Self {
        let key = hash(&[label, &secret.as_bytes()[..], skey]);
        let mut rc4 = Rc4::<U20>::new(&key.into());

        let mut discard = [0u8; KEYSTREAM_DISCARD];
        rc4.apply_keystream(&mut discard);

        Self { rc4 }
    }

    /// XORs the next `data.len()` keystream bytes into `data`.
    pub fn apply(&mut self, data: &mut [u8]) {
        self.rc4.apply_keystream(data);
    }
}

impl fmt::Debug for Keystream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Keystream(..)")
    }
}

/// The pair of keystreams protecting one connection.
///
/// The initiator encrypts with the `keyA` stream and decrypts with `keyB`;
/// the receiver does the opposite. The two halves share no state.
#[derive(Debug)]
pub struct CipherSession {
    incoming: Keystream,
    outgoing: Keystream,
}

impl CipherSession {
    pub fn new(secret: &SharedSecret, skey: &[u8], role: Role) -> Self {
        let a = Keystream::derive(b"keyA", secret, skey);
        let b = Keystream::derive(b"keyB", secret, skey);
        match role {
            Role::Initiator => Self {
                incoming: b,
                outgoing: a,
            },
            Role::Receiver => Self {
                incoming: a,
                outgoing: b,
            },
        }
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.outgoing.apply(data);
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.incoming.apply(data);
    }

    /// Splits into `(incoming, outgoing)` so each direction can be owned separately.
    pub fn into_halves(self) -> (Keystream, Keystream) {
        (self.incoming, self.outgoing)
    }
}
