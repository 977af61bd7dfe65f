use super::*;
use crate::buffer::{BufferPool, BufferedPieceRegistry};
use crate::config::TransportConfig;
use crate::mse::{ActiveTorrents, CryptoMethod, EncryptionPolicy, Negotiator};
use crate::pipeline::{Decoded, MessageCodec, PipelineError, SplicedView};
use crate::torrent::TorrentId;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, DuplexStream};

const TORRENT: TorrentId = TorrentId([0x17; 20]);

fn negotiator(policy: EncryptionPolicy, config: TransportConfig) -> Negotiator {
    let registry = Arc::new(ActiveTorrents::new());
    registry.insert(TORRENT);
    let config = TransportConfig {
        encryption_policy: policy,
        handshake_timeout_secs: 5,
        ..config
    };
    Negotiator::new(config, registry)
}

type Pair = (PeerTransport<DuplexStream>, PeerTransport<DuplexStream>);

async fn connected(policy: EncryptionPolicy, config: TransportConfig) -> Pair {
    let ours = negotiator(policy, config.clone());
    let theirs = negotiator(policy, config);
    let (a, b) = tokio::io::duplex(64 * 1024);

    let (outgoing, incoming) = tokio::join!(
        PeerTransport::establish_outgoing(a, &ours, TORRENT, PeerId::generate()),
        PeerTransport::establish_incoming(b, &theirs, PeerId::generate()),
    );
    let (outgoing, _) = outgoing.unwrap();
    let (incoming, _) = incoming.unwrap();
    (outgoing, incoming)
}

fn sample_messages() -> Vec<Message> {
    vec![
        Message::KeepAlive,
        Message::Choke,
        Message::Unchoke,
        Message::Interested,
        Message::NotInterested,
        Message::Have { piece: 42 },
        Message::Bitfield(Bytes::from_static(&[0xff, 0x80])),
        Message::Request {
            index: 1,
            begin: 0,
            length: 16384,
        },
        Message::Piece {
            index: 3,
            begin: 16384,
            data: Bytes::from(vec![0xab; 300]),
        },
        Message::Cancel {
            index: 1,
            begin: 0,
            length: 16384,
        },
        Message::Port(6881),
        Message::Suggest { piece: 7 },
        Message::HaveAll,
        Message::HaveNone,
        Message::Reject {
            index: 2,
            begin: 0,
            length: 16384,
        },
        Message::AllowedFast { piece: 9 },
        Message::Extended {
            id: 0,
            payload: Bytes::from_static(b"d1:md6:ut_pexi1eee"),
        },
    ]
}

#[test]
fn test_peer_id_generate() {
    let id1 = PeerId::generate();
    let id2 = PeerId::generate();
    assert_ne!(id1.0, id2.0);
    assert_eq!(id1.client_id(), Some("RB0001"));
    assert_eq!(PeerId::from_bytes(id1.as_bytes()), Some(id1));
    assert_eq!(PeerId::from_bytes(&[0u8; 19]), None);
}

#[test]
fn test_handshake_encode_decode() {
    let peer_id = PeerId([2u8; 20]);
    let handshake = Handshake::new(TORRENT, peer_id);
    let encoded = handshake.encode();
    assert_eq!(encoded.len(), 68);

    let decoded = Handshake::decode(&encoded).unwrap();
    assert_eq!(decoded, handshake);
    assert!(decoded.supports_extension_protocol());
    assert!(decoded.supports_fast_extension());
    assert!(!decoded.supports_dht());
}

#[test]
fn test_handshake_rejects_other_protocols() {
    let mut encoded = Handshake::new(TORRENT, PeerId([2u8; 20])).encode().to_vec();
    encoded[1] = b'b';
    assert!(matches!(
        Handshake::decode(&encoded),
        Err(PeerError::InvalidHandshake)
    ));
    assert!(matches!(
        Handshake::decode(&encoded[..40]),
        Err(PeerError::InvalidHandshake)
    ));
}

#[test]
fn test_message_encode_decode() {
    for msg in sample_messages() {
        let mut encoded = msg.encode();
        assert_eq!(encoded.len(), msg.encoded_len());

        let decoded = Message::decode(&mut encoded).unwrap();
        assert_eq!(decoded, msg);
        assert!(encoded.is_empty());
    }
}

#[test]
fn test_piece_message() {
    let data = Bytes::from_static(b"hello world");
    let msg = Message::Piece {
        index: 0,
        begin: 0,
        data: data.clone(),
    };

    let mut encoded = msg.encode();
    assert_eq!(&encoded[..5], &[0, 0, 0, 20, 7]);

    match Message::decode(&mut encoded).unwrap() {
        Message::Piece {
            index,
            begin,
            data: decoded_data,
        } => {
            assert_eq!(index, 0);
            assert_eq!(begin, 0);
            assert_eq!(decoded_data, data);
        }
        other => panic!("expected piece message, got {other:?}"),
    }
}

#[test]
fn test_invalid_message_id() {
    let mut wire = Bytes::from_static(&[0, 0, 0, 1, 11]);
    assert!(matches!(
        Message::decode(&mut wire),
        Err(PeerError::InvalidMessageId(11))
    ));
}

#[test]
fn test_truncated_request_rejected() {
    let mut wire = Bytes::from_static(&[0, 0, 0, 5, 6, 0, 0, 0, 1]);
    assert!(matches!(
        Message::decode(&mut wire),
        Err(PeerError::InvalidMessage(_))
    ));
}

// Codec

#[test]
fn test_codec_decodes_across_splice() {
    let msg = Message::Request {
        index: 5,
        begin: 32768,
        length: 16384,
    };
    let wire = msg.encode();
    let mut codec = PeerWireCodec::default();

    for split in 0..wire.len() {
        let view = SplicedView::new(&wire[..split], &wire[split..]);
        match codec.decode(&view).unwrap() {
            Decoded::Message { consumed, message } => {
                assert_eq!(consumed, wire.len());
                assert_eq!(message, msg);
            }
            Decoded::NeedMore => panic!("complete frame not decoded at split {split}"),
        }
    }
}

#[test]
fn test_codec_needs_more_for_partial_frame() {
    let wire = Message::Have { piece: 1 }.encode();
    let mut codec = PeerWireCodec::default();

    for len in 0..wire.len() {
        let view = SplicedView::new(&wire[..len], &[]);
        assert!(matches!(codec.decode(&view).unwrap(), Decoded::NeedMore));
    }
}

#[test]
fn test_codec_rejects_oversized_length() {
    let mut codec = PeerWireCodec::new(1024);
    let wire = [0u8, 0, 0x10, 0, 7];
    let view = SplicedView::new(&wire, &[]);
    assert!(matches!(
        codec.decode(&view),
        Err(PipelineError::MessageTooLarge { len: 4096, max: 1024 })
    ));
}

#[test]
fn test_codec_reports_unparseable_frame() {
    let mut codec = PeerWireCodec::default();
    let wire = [0u8, 0, 0, 1, 99];
    let view = SplicedView::new(&wire, &[]);
    assert!(matches!(codec.decode(&view), Err(PipelineError::Codec(_))));
}

#[test]
fn test_codec_encode_reports_short_buffer() {
    let mut codec = PeerWireCodec::default();
    let msg = Message::Have { piece: 3 };

    let mut small = [0u8; 8];
    assert_eq!(codec.encode(&msg, &mut small).unwrap(), None);

    let mut out = [0u8; 16];
    assert_eq!(codec.encode(&msg, &mut out).unwrap(), Some(9));
    assert_eq!(&out[..9], &msg.encode()[..]);
}

#[test]
fn test_codec_parks_blocks() {
    let pieces = BufferedPieceRegistry::new();
    let mut codec = PeerWireCodec::default().with_piece_registry(pieces.clone());
    let msg = Message::Piece {
        index: 4,
        begin: 16384,
        data: Bytes::from_static(b"block"),
    };
    let wire = msg.encode();

    for _ in 0..2 {
        let view = SplicedView::new(&wire, &[]);
        assert!(matches!(codec.decode(&view).unwrap(), Decoded::Message { .. }));
    }

    assert_eq!(pieces.len(), 1);
    assert_eq!(pieces.take(4, 16384), Some(Bytes::from_static(b"block")));
    assert_eq!(pieces.take(4, 16384), None);
}

// Transport

#[tokio::test]
async fn test_encrypted_transport_exchanges_messages() {
    let (mut a, mut b) = connected(EncryptionPolicy::RequireEncrypted, TransportConfig::default()).await;
    assert_eq!(a.encryption(), CryptoMethod::Rc4);
    assert_eq!(b.encryption(), CryptoMethod::Rc4);

    for msg in sample_messages() {
        a.send_message(&msg).await.unwrap();
        assert_eq!(b.receive_message().await.unwrap(), msg);

        b.send_message(&msg).await.unwrap();
        assert_eq!(a.receive_message().await.unwrap(), msg);
    }
}

#[tokio::test]
async fn test_plaintext_transport_exchanges_messages() {
    let (mut a, mut b) = connected(EncryptionPolicy::RequirePlaintext, TransportConfig::default()).await;
    assert_eq!(a.encryption(), CryptoMethod::Plaintext);

    for msg in sample_messages() {
        a.send_message(&msg).await.unwrap();
        assert_eq!(b.receive_message().await.unwrap(), msg);
    }
}

#[tokio::test]
async fn test_outgoing_handshake_reports_peer() {
    let ours = negotiator(EncryptionPolicy::PreferEncrypted, TransportConfig::default());
    let theirs = negotiator(EncryptionPolicy::PreferEncrypted, TransportConfig::default());
    let (a, b) = tokio::io::duplex(8192);
    let (our_id, their_id) = (PeerId::generate(), PeerId::generate());

    let (outgoing, incoming) = tokio::join!(
        PeerTransport::establish_outgoing(a, &ours, TORRENT, our_id),
        PeerTransport::establish_incoming(b, &theirs, their_id),
    );
    let (_, seen_by_us) = outgoing.unwrap();
    let (_, seen_by_them) = incoming.unwrap();

    assert_eq!(seen_by_us.peer_id, their_id);
    assert_eq!(seen_by_us.info_hash, TORRENT);
    assert_eq!(seen_by_them.peer_id, our_id);
}

#[tokio::test]
async fn test_queued_messages_flush_in_order() {
    let config = TransportConfig {
        outbound_buffer_size: 64,
        ..TransportConfig::default()
    };
    let (mut a, mut b) = connected(EncryptionPolicy::RequireEncrypted, config).await;

    for piece in 0..40 {
        a.queue_message(&Message::Have { piece }).await.unwrap();
    }
    a.flush().await.unwrap();
    assert!(!a.pipeline().has_pending());

    for piece in 0..40 {
        assert_eq!(b.receive_message().await.unwrap(), Message::Have { piece });
    }
}

#[tokio::test]
async fn test_message_larger_than_outbound_buffer() {
    let config = TransportConfig {
        outbound_buffer_size: 64,
        ..TransportConfig::default()
    };
    let (mut a, _b) = connected(EncryptionPolicy::RequireEncrypted, config).await;
    let msg = Message::Piece {
        index: 0,
        begin: 0,
        data: Bytes::from(vec![1u8; 100]),
    };

    let err = a.send_message(&msg).await.unwrap_err();
    assert!(matches!(
        err,
        PeerError::Pipeline(PipelineError::MessageTooLarge { len: 113, max: 64 })
    ));
}

#[tokio::test]
async fn test_receiver_rejects_oversized_message() {
    let config = TransportConfig {
        max_message_size: 64,
        ..TransportConfig::default()
    };
    let ours = negotiator(EncryptionPolicy::RequirePlaintext, TransportConfig::default());
    let theirs = negotiator(EncryptionPolicy::RequirePlaintext, config);
    let (a, b) = tokio::io::duplex(8192);

    let (outgoing, incoming) = tokio::join!(
        PeerTransport::establish_outgoing(a, &ours, TORRENT, PeerId::generate()),
        PeerTransport::establish_incoming(b, &theirs, PeerId::generate()),
    );
    let (mut a, _) = outgoing.unwrap();
    let (mut b, _) = incoming.unwrap();

    a.send_message(&Message::Bitfield(Bytes::from(vec![0xffu8; 200])))
        .await
        .unwrap();
    assert!(matches!(
        b.receive_message().await,
        Err(PeerError::Pipeline(PipelineError::MessageTooLarge { len: 201, max: 64 }))
    ));
}

#[tokio::test]
async fn test_closed_peer_reported() {
    let (mut a, b) = connected(EncryptionPolicy::RequireEncrypted, TransportConfig::default()).await;
    drop(b);
    assert!(matches!(
        a.receive_message().await,
        Err(PeerError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_info_hash_mismatch() {
    let ours = negotiator(EncryptionPolicy::RequireEncrypted, TransportConfig::default());
    let theirs = negotiator(EncryptionPolicy::RequireEncrypted, TransportConfig::default());
    let (a, b) = tokio::io::duplex(8192);
    let wrong = Handshake::new(TorrentId([0x99; 20]), PeerId::generate()).encode();

    let (outgoing, incoming) = tokio::join!(
        ours.negotiate_outgoing_with_payload(a, TORRENT, &wrong),
        PeerTransport::establish_incoming(b, &theirs, PeerId::generate()),
    );
    let _keep_open = outgoing.unwrap();
    assert!(matches!(incoming, Err(PeerError::InfoHashMismatch)));
}

#[tokio::test]
async fn test_blocks_parked_while_receiving() {
    let (mut a, b) = connected(EncryptionPolicy::RequireEncrypted, TransportConfig::default()).await;
    let pieces = BufferedPieceRegistry::new();
    let mut b = b.with_piece_registry(pieces.clone());

    let block = Message::Piece {
        index: 8,
        begin: 0,
        data: Bytes::from(vec![5u8; 16384]),
    };
    a.send_message(&block).await.unwrap();
    assert_eq!(b.receive_message().await.unwrap(), block);

    assert_eq!(pieces.parked_bytes(), 16384);
    assert!(pieces.contains(8, 0));
}

#[tokio::test]
async fn test_transport_over_pooled_buffers() {
    let config = TransportConfig::default();
    let inbound = BufferPool::new(4096, 2);
    let outbound = BufferPool::new(1024, 2);
    let (a, b) = tokio::io::duplex(8192);

    let mut writer = PeerTransport::from_pools(a, &[], None, &config, &inbound, &outbound).unwrap();
    let mut reader = PeerTransport::from_pools(b, &[], None, &config, &inbound, &outbound).unwrap();
    assert_eq!(inbound.available(), 0);

    writer.send_message(&Message::Unchoke).await.unwrap();
    assert_eq!(reader.receive_message().await.unwrap(), Message::Unchoke);

    drop(writer);
    drop(reader);
    assert_eq!(inbound.available(), 2);
    assert_eq!(outbound.available(), 2);
}

#[tokio::test]
async fn test_prefix_decoded_before_stream() {
    let config = TransportConfig::default();
    let (a, mut b) = tokio::io::duplex(8192);
    let prefix = Message::Have { piece: 1 }.encode();

    let mut transport = PeerTransport::from_parts(a, &prefix, None, &config).unwrap();
    b.write_all(&Message::Have { piece: 2 }.encode()).await.unwrap();

    assert_eq!(transport.receive_message().await.unwrap(), Message::Have { piece: 1 });
    assert_eq!(transport.receive_message().await.unwrap(), Message::Have { piece: 2 });
}

#[tokio::test(start_paused = true)]
async fn test_read_timeout() {
    let config = TransportConfig::default();
    let (a, _b) = tokio::io::duplex(8192);
    let mut transport = PeerTransport::new(a, &config).unwrap();
    transport.set_timeouts(
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(2),
    );

    assert!(matches!(
        transport.receive_message().await,
        Err(PeerError::Timeout)
    ));
}

// Connection

#[tokio::test]
async fn test_tcp_connect_and_accept() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ours = negotiator(EncryptionPolicy::PreferEncrypted, TransportConfig::default());
    let theirs = negotiator(EncryptionPolicy::PreferEncrypted, TransportConfig::default());
    let their_id = PeerId::generate();

    let (outgoing, incoming) = tokio::join!(
        PeerConnection::connect(addr, TORRENT, PeerId::generate(), &ours),
        async {
            let (stream, _) = listener.accept().await.unwrap();
            PeerConnection::accept(stream, their_id, &theirs).await
        },
    );
    let mut outgoing = outgoing.unwrap();
    let mut incoming = incoming.unwrap();

    assert!(outgoing.is_connected());
    assert_eq!(outgoing.peer_id, their_id);
    assert_eq!(outgoing.encryption, CryptoMethod::Rc4);
    assert_eq!(incoming.info_hash, TORRENT);
    assert!(incoming.supports_fast);

    let block = Message::Piece {
        index: 0,
        begin: 0,
        data: Bytes::from(vec![9u8; 512]),
    };
    outgoing.send(block.clone()).await.unwrap();
    assert_eq!(incoming.receive().await.unwrap(), block);
    assert_eq!(outgoing.bytes_uploaded, 512);
    assert_eq!(incoming.bytes_downloaded, 512);

    outgoing.disconnect();
    assert!(!outgoing.is_connected());
    assert_eq!(outgoing.state, PeerState::Disconnected);
    assert!(matches!(
        outgoing.send(Message::Choke).await,
        Err(PeerError::ConnectionClosed)
    ));
    assert!(matches!(
        incoming.receive().await,
        Err(PeerError::ConnectionClosed)
    ));
}
