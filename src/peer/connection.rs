use super::error::PeerError;
use super::message::{Handshake, Message};
use super::peer_id::PeerId;
use super::transport::PeerTransport;
use crate::constants::CONNECTION_TIMEOUT;
use crate::mse::{CryptoMethod, Negotiator};
use crate::torrent::TorrentId;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// The connection state of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Fully connected and ready for data exchange.
    Connected,
    /// Connection has been closed.
    Disconnected,
}

/// An encrypted connection to a BitTorrent peer over TCP.
///
/// Both constructors run the encryption handshake and the BitTorrent
/// handshake before returning, so a connection is usable as soon as it
/// exists.
///
/// # Examples
///
/// ```no_run
/// use rbit_transport::mse::{ActiveTorrents, Negotiator};
/// use rbit_transport::peer::{Message, PeerConnection, PeerId};
/// use rbit_transport::{TorrentId, TransportConfig};
/// use std::net::SocketAddr;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let torrents = Arc::new(ActiveTorrents::new());
/// let negotiator = Negotiator::new(TransportConfig::default(), torrents);
///
/// let addr: SocketAddr = "192.168.1.100:6881".parse()?;
/// let info_hash = TorrentId([0u8; 20]);
/// let mut conn = PeerConnection::connect(addr, info_hash, PeerId::generate(), &negotiator).await?;
///
/// conn.send(Message::Interested).await?;
/// let reply = conn.receive().await?;
/// # Ok(())
/// # }
/// ```
pub struct PeerConnection {
    /// The peer's socket address.
    pub addr: SocketAddr,
    /// The torrent this connection serves.
    pub info_hash: TorrentId,
    /// The peer's ID from its handshake.
    pub peer_id: PeerId,
    /// Current connection state.
    pub state: PeerState,
    /// Stream treatment agreed during the encryption handshake.
    pub encryption: CryptoMethod,
    /// Whether the peer supports the Fast Extension (BEP-6).
    pub supports_fast: bool,
    /// Whether the peer supports the Extension Protocol (BEP-10).
    pub supports_extension: bool,
    /// Whether the peer runs a DHT node (BEP-5).
    pub supports_dht: bool,
    /// When the connection was established.
    pub connected_at: Instant,
    /// When the last message was received.
    pub last_message_at: Instant,
    /// Total block bytes downloaded from this peer.
    pub bytes_downloaded: u64,
    /// Total block bytes uploaded to this peer.
    pub bytes_uploaded: u64,
    transport: Option<PeerTransport<TcpStream>>,
}

impl PeerConnection {
    pub async fn connect(
        addr: SocketAddr,
        info_hash: TorrentId,
        our_peer_id: PeerId,
        negotiator: &Negotiator,
    ) -> Result<Self, PeerError> {
        let stream = timeout(CONNECTION_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| PeerError::Timeout)??;
        stream.set_nodelay(true)?;

        let (transport, theirs) =
            PeerTransport::establish_outgoing(stream, negotiator, info_hash, our_peer_id).await?;
        Ok(Self::established(addr, theirs, transport))
    }

    /// Accepts a peer on behalf of whichever active torrent it asks for.
    pub async fn accept(
        stream: TcpStream,
        our_peer_id: PeerId,
        negotiator: &Negotiator,
    ) -> Result<Self, PeerError> {
        let addr = stream.peer_addr()?;
        stream.set_nodelay(true)?;

        let (transport, theirs) =
            PeerTransport::establish_incoming(stream, negotiator, our_peer_id).await?;
        Ok(Self::established(addr, theirs, transport))
    }

    fn established(
        addr: SocketAddr,
        theirs: Handshake,
        transport: PeerTransport<TcpStream>,
    ) -> Self {
        let now = Instant::now();
        Self {
            addr,
            info_hash: theirs.info_hash,
            peer_id: theirs.peer_id,
            state: PeerState::Connected,
            encryption: transport.encryption(),
            supports_fast: theirs.supports_fast_extension(),
            supports_extension: theirs.supports_extension_protocol(),
            supports_dht: theirs.supports_dht(),
            connected_at: now,
            last_message_at: now,
            bytes_downloaded: 0,
            bytes_uploaded: 0,
            transport: Some(transport),
        }
    }

    pub async fn send(&mut self, message: Message) -> Result<(), PeerError> {
        let transport = self.transport.as_mut().ok_or(PeerError::ConnectionClosed)?;
        transport.send_message(&message).await?;

        if let Message::Piece { ref data, .. } = message {
            self.bytes_uploaded += data.len() as u64;
        }
        Ok(())
    }

    pub async fn receive(&mut self) -> Result<Message, PeerError> {
        let transport = self.transport.as_mut().ok_or(PeerError::ConnectionClosed)?;
        let message = transport.receive_message().await?;
        self.last_message_at = Instant::now();

        if let Message::Piece { ref data, .. } = message {
            self.bytes_downloaded += data.len() as u64;
        }
        Ok(message)
    }

    pub fn transport_mut(&mut self) -> Option<&mut PeerTransport<TcpStream>> {
        self.transport.as_mut()
    }

    pub fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(addr = %self.addr, "peer disconnected");
        }
        self.state = PeerState::Disconnected;
    }

    pub fn is_connected(&self) -> bool {
        self.state == PeerState::Connected && self.transport.is_some()
    }
}
