//! Peer wire protocol (BEP-3, BEP-6, BEP-10) over an encrypted transport
//!
//! Connections are encrypted with [`mse`](crate::mse) before the BitTorrent
//! handshake, then framed by a [`PeerWireCodec`] running inside a
//! [`Pipeline`](crate::pipeline::Pipeline).

mod codec;
mod connection;
mod error;
mod message;
mod peer_id;
mod transport;

pub use codec::PeerWireCodec;
pub use connection::{PeerConnection, PeerState};
pub use error::PeerError;
pub use message::{Handshake, Message, MessageId};
pub use peer_id::PeerId;
pub use transport::PeerTransport;

#[cfg(test)]
mod tests;
