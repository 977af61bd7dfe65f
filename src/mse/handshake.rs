use super::error::MseError;
use super::policy::CryptoMethod;
use super::registry::TorrentRegistry;
use super::state::{HandshakeMachine, HandshakeState};
use super::stream::MseStream;
use crate::config::TransportConfig;
use crate::constants::{
    CRYPTO_FIELD_LEN, DH_KEY_LEN, HASH_LEN, MSE_MAX_INITIAL_PAYLOAD, MSE_MAX_PADDING,
    MSE_MAX_PUBLIC_KEY_BLOCK, VC, VC_LEN,
};
use crate::crypto::{hash, CipherSession, KeyPair, PublicKey, Role, SharedSecret};
use crate::reader::BoundedReader;
use crate::torrent::TorrentId;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::Rng as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Length of `crypto_select/provide ‖ len(pad)`.
const POLICY_HEADER_LEN: usize = CRYPTO_FIELD_LEN + 2;

/// Runs message stream encryption handshakes.
///
/// A negotiator is cheap to share; each call is an independent attempt that
/// blocks its task across the round trips. Every read step is bounded by
/// the configured deadline and by the byte counts the protocol allows, so a
/// stalling or flooding peer fails the attempt instead of holding it open.
pub struct Negotiator {
    config: TransportConfig,
    registry: Arc<dyn TorrentRegistry>,
}

impl Negotiator {
    pub fn new(config: TransportConfig, registry: Arc<dyn TorrentRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Negotiates as initiator for `torrent`, with no initial payload.
    pub async fn negotiate_outgoing<S>(
        &self,
        stream: S,
        torrent: TorrentId,
    ) -> Result<MseStream<S>, MseError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.negotiate_outgoing_with_payload(stream, torrent, &[])
            .await
    }

    /// Negotiates as initiator, sending `payload` inside the encrypted
    /// negotiation block.
    pub async fn negotiate_outgoing_with_payload<S>(
        &self,
        mut stream: S,
        torrent: TorrentId,
        payload: &[u8],
    ) -> Result<MseStream<S>, MseError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if payload.len() > MSE_MAX_INITIAL_PAYLOAD {
            return Err(MseError::PayloadTooLong(payload.len()));
        }

        let policy = self.config.encryption_policy;
        let mut hs = Exchange::new(Role::Initiator, self.config.handshake_timeout());
        let keys = KeyPair::generate();

        let mut out = BytesMut::with_capacity(MSE_MAX_PUBLIC_KEY_BLOCK);
        out.put_slice(keys.public_key().as_bytes());
        put_random_padding(&mut out, self.config.padding_limit());
        send(&mut stream, &out).await?;
        hs.machine.advance(HandshakeState::SentPublicKey)?;

        hs.fill(&mut stream, DH_KEY_LEN, MSE_MAX_PUBLIC_KEY_BLOCK)
            .await?;
        let peer_key = PublicKey::from_bytes(&hs.take(DH_KEY_LEN))?;
        hs.machine.advance(HandshakeState::ReceivedPublicKey)?;

        let secret = keys.shared_secret(&peer_key)?;
        hs.machine.advance(HandshakeState::SecretComputed)?;

        let skey = torrent.as_bytes();
        let mut cipher = CipherSession::new(&secret, skey, Role::Initiator);

        let provide = policy.crypto_provide();
        let pad_len = random_padding_len(self.config.padding_limit());
        let mut out =
            BytesMut::with_capacity(2 * HASH_LEN + VC_LEN + 2 * POLICY_HEADER_LEN + pad_len + payload.len());
        out.put_slice(&hash(&[&b"req1"[..], &secret.as_bytes()[..]]));
        out.put_slice(&selector_hash(&secret, skey));
        hs.machine.advance(HandshakeState::SelectorSent)?;

        let block = out.len();
        out.put_slice(&VC);
        out.put_u32(provide);
        out.put_u16(pad_len as u16);
        out.put_bytes(0, pad_len);
        out.put_u16(payload.len() as u16);
        out.put_slice(payload);
        cipher.encrypt(&mut out[block..]);
        send(&mut stream, &out).await?;
        hs.machine.advance(HandshakeState::PolicySent)?;

        // The receiver's block starts with VC under its keystream.
        let mut marker = VC;
        cipher.decrypt(&mut marker);
        hs.sync(&mut stream, &marker, MSE_MAX_PADDING + VC_LEN).await?;

        let mut header = hs
            .read_exact(&mut stream, POLICY_HEADER_LEN, Some(&mut cipher))
            .await?;
        let select = header.get_u32();
        let pad_len = header.get_u16() as usize;
        if pad_len > MSE_MAX_PADDING {
            return Err(MseError::PaddingTooLong(pad_len));
        }
        hs.read_exact(&mut stream, pad_len, Some(&mut cipher))
            .await?;
        hs.machine.advance(HandshakeState::PolicyReceived)?;

        let method = CryptoMethod::from_select(select).ok_or(MseError::InvalidCryptoSelect(select))?;
        if provide & method.bit() == 0 || !policy.accepts(method) {
            return Err(MseError::PolicyMismatch {
                local: policy,
                offered: select,
            });
        }
        hs.machine.advance(HandshakeState::Done(method))?;

        tracing::debug!(torrent = %torrent, ?method, "outgoing encryption handshake complete");
        Ok(hs.finish(stream, cipher, method, Bytes::new()))
    }

    /// Negotiates as receiver, returning the channel and the torrent the
    /// initiator asked for.
    pub async fn negotiate_incoming<S>(
        &self,
        mut stream: S,
    ) -> Result<(MseStream<S>, TorrentId), MseError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut hs = Exchange::new(Role::Receiver, self.config.handshake_timeout());

        hs.fill(&mut stream, DH_KEY_LEN, MSE_MAX_PUBLIC_KEY_BLOCK)
            .await?;
        let peer_key = PublicKey::from_bytes(&hs.take(DH_KEY_LEN))?;
        hs.machine.advance(HandshakeState::ReceivedPublicKey)?;

        let keys = KeyPair::generate();
        let mut out = BytesMut::with_capacity(MSE_MAX_PUBLIC_KEY_BLOCK);
        out.put_slice(keys.public_key().as_bytes());
        put_random_padding(&mut out, self.config.padding_limit());
        send(&mut stream, &out).await?;
        hs.machine.advance(HandshakeState::SentPublicKey)?;

        let secret = keys.shared_secret(&peer_key)?;
        hs.machine.advance(HandshakeState::SecretComputed)?;

        let req1 = hash(&[&b"req1"[..], &secret.as_bytes()[..]]);
        hs.sync(&mut stream, &req1, MSE_MAX_PADDING + HASH_LEN)
            .await?;

        let selector = hs.read_exact(&mut stream, HASH_LEN, None).await?;
        let torrent = self.match_selector(&secret, &selector)?;
        hs.machine.advance(HandshakeState::SelectorMatched)?;

        let mut cipher = CipherSession::new(&secret, torrent.as_bytes(), Role::Receiver);

        let mut header = hs
            .read_exact(&mut stream, VC_LEN + POLICY_HEADER_LEN, Some(&mut cipher))
            .await?;
        if header[..VC_LEN] != VC {
            return Err(MseError::InvalidVerificationConstant);
        }
        header.advance(VC_LEN);
        let provide = header.get_u32();
        let pad_len = header.get_u16() as usize;
        if pad_len > MSE_MAX_PADDING {
            return Err(MseError::PaddingTooLong(pad_len));
        }
        hs.read_exact(&mut stream, pad_len, Some(&mut cipher))
            .await?;

        let payload_len = hs
            .read_exact(&mut stream, 2, Some(&mut cipher))
            .await?
            .get_u16() as usize;
        let payload = hs
            .read_exact(&mut stream, payload_len, Some(&mut cipher))
            .await?;
        hs.machine.advance(HandshakeState::PolicyReceived)?;

        let method = self.config.encryption_policy.select(provide)?;

        let pad_len = random_padding_len(self.config.padding_limit());
        let mut out = BytesMut::with_capacity(VC_LEN + POLICY_HEADER_LEN + pad_len);
        out.put_slice(&VC);
        out.put_u32(method.bit());
        out.put_u16(pad_len as u16);
        out.put_bytes(0, pad_len);
        cipher.encrypt(&mut out);
        send(&mut stream, &out).await?;
        hs.machine.advance(HandshakeState::PolicySent)?;
        hs.machine.advance(HandshakeState::Done(method))?;

        tracing::debug!(torrent = %torrent, ?method, "incoming encryption handshake complete");
        Ok((hs.finish(stream, cipher, method, payload.freeze()), torrent))
    }

    fn match_selector(
        &self,
        secret: &SharedSecret,
        selector: &[u8],
    ) -> Result<TorrentId, MseError> {
        let req3 = hash(&[&b"req3"[..], &secret.as_bytes()[..]]);

        for id in self.registry.torrent_ids() {
            let expected = xor(hash(&[&b"req2"[..], &id.as_bytes()[..]]), req3);
            if expected[..] == *selector {
                if self.registry.is_active(&id) {
                    return Ok(id);
                }
                tracing::debug!(torrent = %id, "encrypted connection for inactive torrent");
                return Err(MseError::UnsupportedTorrent);
            }
        }

        tracing::debug!("encrypted connection for unknown torrent");
        Err(MseError::UnsupportedTorrent)
    }
}

/// Per-attempt state: the step machine and raw bytes read ahead.
struct Exchange {
    machine: HandshakeMachine,
    inbound: BytesMut,
    timeout: Duration,
}

impl Exchange {
    fn new(role: Role, timeout: Duration) -> Self {
        Self {
            machine: HandshakeMachine::new(role),
            inbound: BytesMut::new(),
            timeout,
        }
    }

    /// Ensures at least `need` unconsumed bytes, failing if the peer has
    /// sent more than `max` in total for this step.
    ///
    /// With `max == need` the read is exact and never consumes bytes that
    /// belong to a later step.
    async fn fill<S>(&mut self, stream: &mut S, need: usize, max: usize) -> Result<(), MseError>
    where
        S: AsyncRead + Unpin,
    {
        let have = self.inbound.len();
        if have >= need {
            return Ok(());
        }

        let min = need - have;
        let max = max.max(need) - have;
        let room = if max > min { max + 1 } else { min };

        let mut scratch = vec![0u8; room];
        let n = BoundedReader::new(min, max, self.timeout)
            .read(stream, &mut scratch)
            .await?;
        self.inbound.extend_from_slice(&scratch[..n]);
        Ok(())
    }

    /// Removes `n` raw bytes from the front of the read-ahead buffer.
    fn take(&mut self, n: usize) -> BytesMut {
        self.inbound.split_to(n)
    }

    /// Reads exactly `n` bytes, decrypting them when a cipher is given.
    async fn read_exact<S>(
        &mut self,
        stream: &mut S,
        n: usize,
        cipher: Option<&mut CipherSession>,
    ) -> Result<BytesMut, MseError>
    where
        S: AsyncRead + Unpin,
    {
        self.fill(stream, n, n).await?;
        let mut bytes = self.take(n);
        if let Some(cipher) = cipher {
            cipher.decrypt(&mut bytes);
        }
        Ok(bytes)
    }

    /// Discards bytes up to and including `pattern`, which must appear
    /// within `window` bytes.
    async fn sync<S>(&mut self, stream: &mut S, pattern: &[u8], window: usize) -> Result<(), MseError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; window.max(self.inbound.len())];
        let filled = self.inbound.len();
        buf[..filled].copy_from_slice(&self.inbound);

        let found = BoundedReader::new(pattern.len(), window, self.timeout)
            .read_until(stream, &mut buf, filled, pattern)
            .await?;

        self.inbound.clear();
        self.inbound
            .extend_from_slice(&buf[found.end(pattern.len())..found.read]);
        tracing::trace!("mse synchronized after {} bytes", found.position);
        Ok(())
    }

    /// Wraps the stream, handing over the payload and any read-ahead bytes.
    fn finish<S>(
        self,
        stream: S,
        mut cipher: CipherSession,
        method: CryptoMethod,
        payload: Bytes,
    ) -> MseStream<S> {
        let mut leftover = self.inbound;
        if method == CryptoMethod::Rc4 {
            cipher.decrypt(&mut leftover);
        }

        let prefix = if payload.is_empty() {
            leftover.freeze()
        } else {
            let mut prefix = BytesMut::with_capacity(payload.len() + leftover.len());
            prefix.put_slice(&payload);
            prefix.put_slice(&leftover);
            prefix.freeze()
        };

        match method {
            CryptoMethod::Rc4 => MseStream::encrypted(stream, prefix, cipher),
            CryptoMethod::Plaintext => MseStream::plain(stream, prefix),
        }
    }
}

/// `HASH("req2" ‖ SKEY) XOR HASH("req3" ‖ S)`
fn selector_hash(secret: &SharedSecret, skey: &[u8]) -> [u8; HASH_LEN] {
    xor(
        hash(&[&b"req2"[..], skey]),
        hash(&[&b"req3"[..], &secret.as_bytes()[..]]),
    )
}

fn xor(mut a: [u8; HASH_LEN], b: [u8; HASH_LEN]) -> [u8; HASH_LEN] {
    for (x, y) in a.iter_mut().zip(b) {
        *x ^= y;
    }
    a
}

fn random_padding_len(limit: usize) -> usize {
    rand::rng().random_range(0..=limit.min(MSE_MAX_PADDING))
}

fn put_random_padding(out: &mut BytesMut, limit: usize) {
    let len = random_padding_len(limit);
    let start = out.len();
    out.put_bytes(0, len);
    rand::rng().fill(&mut out[start..]);
}

async fn send<S>(stream: &mut S, bytes: &[u8]) -> Result<(), MseError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(bytes).await?;
    stream.flush().await?;
    Ok(())
}
