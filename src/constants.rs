//! Protocol constants and tuning parameters.
//!
//! This module contains the constants used throughout the transport layer:
//! message stream encryption (MSE) wire values, handshake bounds, buffer
//! sizes and the BitTorrent peer wire framing values.
//!
//! MSE values follow the de-facto specification shared by libtorrent,
//! Vuze and qBittorrent, so obfuscated connections interoperate with them.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Client ID prefix for peer ID generation (Azureus-style)
pub const CLIENT_PREFIX: &[u8] = b"-RB0001-";

// ============================================================================
// Key exchange
// ============================================================================

/// Width in bytes of public keys and of the shared secret (768-bit group)
pub const DH_KEY_LEN: usize = 96;

/// Length of the random private exponent (160 bits)
pub const DH_PRIVATE_KEY_LEN: usize = 20;

/// Generator of the MSE group
pub const DH_GENERATOR: u32 = 2;

/// The 768-bit safe prime used by MSE, big-endian
pub const DH_PRIME: [u8; DH_KEY_LEN] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xC9, 0x0F, 0xDA, 0xA2, 0x21, 0x68, 0xC2, 0x34,
    0xC4, 0xC6, 0x62, 0x8B, 0x80, 0xDC, 0x1C, 0xD1, 0x29, 0x02, 0x4E, 0x08, 0x8A, 0x67, 0xCC, 0x74,
    0x02, 0x0B, 0xBE, 0xA6, 0x3B, 0x13, 0x9B, 0x22, 0x51, 0x4A, 0x08, 0x79, 0x8E, 0x34, 0x04, 0xDD,
    0xEF, 0x95, 0x19, 0xB3, 0xCD, 0x3A, 0x43, 0x1B, 0x30, 0x2B, 0x0A, 0x6D, 0xF2, 0x5F, 0x14, 0x37,
    0x4F, 0xE1, 0x35, 0x6D, 0x6D, 0x51, 0xC2, 0x45, 0xE4, 0x85, 0xB5, 0x76, 0x62, 0x5E, 0x7E, 0xC6,
    0xF4, 0x4C, 0x42, 0xE9, 0xA6, 0x3A, 0x36, 0x21, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09, 0x05, 0x63,
];

// ============================================================================
// Message stream encryption
// ============================================================================

/// Maximum random padding after a public key, and maximum PadC/PadD length
pub const MSE_MAX_PADDING: usize = 512;

/// Length of the verification constant
pub const VC_LEN: usize = 8;

/// The verification constant: eight zero bytes
pub const VC: [u8; VC_LEN] = [0u8; VC_LEN];

/// Length of SHA-1 digests exchanged during the handshake
pub const HASH_LEN: usize = 20;

/// Length of the crypto_provide / crypto_select fields
pub const CRYPTO_FIELD_LEN: usize = 4;

/// Keystream bytes discarded before first use
pub const KEYSTREAM_DISCARD: usize = 1024;

/// Crypto method bit: plaintext
pub const CRYPTO_PLAINTEXT: u32 = 0x01;

/// Crypto method bit: RC4 stream cipher
pub const CRYPTO_RC4: u32 = 0x02;

/// Largest initial payload accepted from an initiator
pub const MSE_MAX_INITIAL_PAYLOAD: usize = 65535;

/// Bytes an initiator may send before waiting for our public key
pub const MSE_MAX_PUBLIC_KEY_BLOCK: usize = DH_KEY_LEN + MSE_MAX_PADDING;

// ============================================================================
// Timeouts
// ============================================================================

/// Deadline for each read step of the encryption handshake
pub const MSE_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for TCP connection establishment
pub const CONNECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Timeout for the BitTorrent handshake after negotiation
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading a message from an established peer
pub const PEER_READ_TIMEOUT: Duration = Duration::from_secs(180);

/// Timeout for writing a message to an established peer
pub const PEER_WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sleep between read attempts on a channel that reported no data
pub const READ_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Buffers
// ============================================================================

/// Inbound ring buffer capacity per connection
pub const INBOUND_BUFFER_SIZE: usize = 256 * 1024;

/// Outbound buffer capacity per connection
pub const OUTBOUND_BUFFER_SIZE: usize = 64 * 1024;

/// Number of arenas kept warm by a buffer pool
pub const BUFFER_POOL_ARENAS: usize = 64;

/// Maximum peer wire message length (length prefix value)
pub const MAX_MESSAGE_SIZE: usize = 16777216;

/// Standard block size for piece requests
pub const BLOCK_SIZE: usize = 16384;

// ============================================================================
// Peer wire protocol
// ============================================================================

/// Protocol string in the BitTorrent handshake
pub const PROTOCOL_STRING: &[u8] = b"BitTorrent protocol";

/// Length of the BitTorrent handshake
pub const HANDSHAKE_LEN: usize = 68;

/// Extension protocol bit (BEP-10), reserved byte 5
pub const EXTENSION_BIT: u8 = 0x10;

/// DHT bit (BEP-5), reserved byte 7
pub const DHT_BIT: u8 = 0x01;

/// Fast extension bit (BEP-6), reserved byte 7
pub const FAST_EXTENSION_BIT: u8 = 0x04;
