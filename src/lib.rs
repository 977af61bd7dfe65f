//! rbit-transport - BitTorrent peer connection transport
//!
//! This library provides the layer between a TCP socket and the BitTorrent
//! peer wire protocol: message stream encryption, bounded handshake reads,
//! and a ring-buffer message pipeline that decrypts and frames messages in
//! place.
//!
//! # Modules
//!
//! - [`mse`] - Message stream encryption handshake and encrypted channels
//! - [`crypto`] - Diffie-Hellman key exchange and RC4 keystreams
//! - [`reader`] - Deadline- and size-bounded reads with marker scanning
//! - [`pipeline`] - Ring-buffer message pipeline with buffer mutators
//! - [`buffer`] - Pooled arenas and the buffered piece registry
//! - [`peer`] - BEP-3/6/10 peer wire messages over the pipeline
//! - [`config`] - Transport configuration
//! - [`torrent`] - Torrent identity

pub mod buffer;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod mse;
pub mod peer;
pub mod pipeline;
pub mod reader;
pub mod torrent;

pub use buffer::{BorrowedBuffer, BufferPool, BufferedPieceRegistry};
pub use config::TransportConfig;
pub use crypto::{CipherSession, CryptoError, KeyPair, Keystream};
pub use mse::{
    ActiveTorrents, CryptoMethod, EncryptionPolicy, MseError, MseStream, Negotiator,
    TorrentRegistry,
};
pub use peer::{
    Handshake, Message, PeerConnection, PeerError, PeerId, PeerState, PeerTransport,
    PeerWireCodec,
};
pub use pipeline::{MessageCodec, Pipeline, PipelineError};
pub use reader::{BoundedReader, ReadError};
pub use torrent::{TorrentId, TorrentIdError};
