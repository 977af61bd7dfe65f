//! Message stream encryption (MSE / protocol encryption).
//!
//! MSE disguises a BitTorrent connection as random noise before any peer
//! wire bytes are exchanged. The handshake runs a key exchange, proves
//! knowledge of the torrent being requested without revealing its info hash,
//! and negotiates whether the rest of the stream is RC4-encrypted or plain.
//!
//! - [`Negotiator`] - drives the handshake for either role
//! - [`EncryptionPolicy`] / [`CryptoMethod`] - policy negotiation table
//! - [`MseStream`] - the resulting pass-through or cipher-wrapped channel
//! - [`TorrentRegistry`] - torrent lookup used when accepting connections
//!
//! MSE is a traffic-shaping evasion measure. It provides no authentication
//! and should not be relied on for confidentiality.
//!
//! # Examples
//!
//! ```
//! use rbit_transport::mse::{ActiveTorrents, CryptoMethod, Negotiator};
//! use rbit_transport::{TorrentId, TransportConfig};
//! use std::sync::Arc;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let torrent = TorrentId([9u8; 20]);
//! let registry = Arc::new(ActiveTorrents::new());
//! registry.insert(torrent);
//!
//! let negotiator = Negotiator::new(TransportConfig::default(), registry);
//! let (a, b) = tokio::io::duplex(4096);
//!
//! let (outgoing, incoming) = tokio::join!(
//!     negotiator.negotiate_outgoing(a, torrent),
//!     negotiator.negotiate_incoming(b),
//! );
//! let mut outgoing = outgoing?;
//! let (mut incoming, matched) = incoming?;
//!
//! assert_eq!(matched, torrent);
//! assert_eq!(outgoing.method(), CryptoMethod::Rc4);
//!
//! outgoing.write_all(b"ping").await?;
//! outgoing.flush().await?;
//! let mut buf = [0u8; 4];
//! incoming.read_exact(&mut buf).await?;
//! assert_eq!(&buf, b"ping");
//! # Ok(())
//! # }
//! ```

mod error;
mod handshake;
mod policy;
mod registry;
mod state;
mod stream;

pub use crate::crypto::Role;
pub use error::MseError;
pub use handshake::Negotiator;
pub use policy::{CryptoMethod, EncryptionPolicy, ParsePolicyError};
pub use registry::{ActiveTorrents, TorrentRegistry};
pub use state::{HandshakeMachine, HandshakeState};
pub use stream::MseStream;
