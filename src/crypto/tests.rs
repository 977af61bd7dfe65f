use super::*;
use crate::constants::{DH_KEY_LEN, DH_PRIME};
use num_bigint::BigUint;

#[test]
fn test_shared_secret_agreement() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();

    let s1 = a.shared_secret(b.public_key()).unwrap();
    let s2 = b.shared_secret(a.public_key()).unwrap();

    assert_eq!(s1, s2);
    assert_eq!(s1.as_bytes().len(), DH_KEY_LEN);
}

#[test]
fn test_generated_keys_differ() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    assert_ne!(a.public_key(), b.public_key());
}

#[test]
fn test_public_key_of_known_exponent() {
    // 2^1 mod P = 2
    let pair = KeyPair::from_private_bytes(&[1]);
    let mut expected = [0u8; DH_KEY_LEN];
    expected[DH_KEY_LEN - 1] = 2;
    assert_eq!(pair.public_key().as_bytes(), &expected);
}

#[test]
fn test_fixed_width_preserves_leading_zeros() {
    let small = BigUint::from(0x0102u32);
    let encoded = to_fixed_be(&small);
    assert_eq!(encoded.len(), DH_KEY_LEN);
    assert!(encoded[..DH_KEY_LEN - 2].iter().all(|&b| b == 0));
    assert_eq!(&encoded[DH_KEY_LEN - 2..], &[0x01, 0x02]);

    let zero = to_fixed_be(&BigUint::from(0u32));
    assert_eq!(zero, [0u8; DH_KEY_LEN]);

    let full = to_fixed_be(&BigUint::from_bytes_be(&DH_PRIME));
    assert_eq!(full, DH_PRIME);
}

#[test]
fn test_rejects_degenerate_public_keys() {
    let pair = KeyPair::generate();

    let mut one = [0u8; DH_KEY_LEN];
    one[DH_KEY_LEN - 1] = 1;
    let p_minus_one = to_fixed_be(&(BigUint::from_bytes_be(&DH_PRIME) - 1u32));

    for bytes in [[0u8; DH_KEY_LEN], one, p_minus_one, DH_PRIME, [0xFF; DH_KEY_LEN]] {
        let key = PublicKey::from_bytes(&bytes).unwrap();
        assert!(matches!(
            pair.shared_secret(&key),
            Err(CryptoError::InvalidPublicKey)
        ));
    }
}

#[test]
fn test_public_key_length_checked() {
    let err = PublicKey::from_bytes(&[1u8; 95]).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InvalidKeyLength {
            expected: 96,
            actual: 95
        }
    ));
}

#[test]
fn test_cipher_session_directions() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let secret = a.shared_secret(b.public_key()).unwrap();
    let skey = [0xABu8; 20];

    let mut initiator = CipherSession::new(&secret, &skey, Role::Initiator);
    let mut receiver = CipherSession::new(&secret, &skey, Role::Receiver);

    let plain = b"the quick brown fox".to_vec();

    let mut upstream = plain.clone();
    initiator.encrypt(&mut upstream);
    assert_ne!(upstream, plain);
    receiver.decrypt(&mut upstream);
    assert_eq!(upstream, plain);

    let mut downstream = plain.clone();
    receiver.encrypt(&mut downstream);
    initiator.decrypt(&mut downstream);
    assert_eq!(downstream, plain);
}

#[test]
fn test_keystream_depends_on_selector() {
    let a = KeyPair::generate();
    let b = KeyPair::generate();
    let secret = a.shared_secret(b.public_key()).unwrap();

    let mut one = Keystream::derive(b"keyA", &secret, &[1u8; 20]);
    let mut two = Keystream::derive(b"keyA", &secret, &[2u8; 20]);

    let mut x = [0u8; 16];
    let mut y = [0u8; 16];
    one.apply(&mut x);
    two.apply(&mut y);
    assert_ne!(x, y);
}

#[test]
fn test_keystream_is_continuous() {
    let pair = KeyPair::generate();
    let other = KeyPair::generate();
    let secret = pair.shared_secret(other.public_key()).unwrap();

    let mut whole = Keystream::derive(b"keyB", &secret, &[3u8; 20]);
    let mut split = Keystream::derive(b"keyB", &secret, &[3u8; 20]);

    let mut a = [0u8; 64];
    whole.apply(&mut a);

    let mut b = [0u8; 64];
    split.apply(&mut b[..10]);
    split.apply(&mut b[10..]);

    assert_eq!(a, b);
}

#[test]
fn test_hash_concatenates_parts() {
    assert_eq!(hash(&[&b"req"[..], &b"1"[..]]), hash(&[&b"req1"[..]]));
    assert_ne!(hash(&[&b"req1"[..]]), hash(&[&b"req2"[..]]));
}
