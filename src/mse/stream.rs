use super::policy::CryptoMethod;
use crate::crypto::CipherSession;
use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// A channel produced by the encryption handshake.
///
/// Bytes that arrived during the handshake but belong to the application
/// (the initial payload and anything the peer sent after its final
/// handshake block) are returned first by reads.
///
/// In [`CryptoMethod::Rc4`] mode every byte read is decrypted in place and
/// every byte written is encrypted before it reaches the delegate. Encrypted
/// bytes the delegate has not accepted yet are staged internally, so writers
/// must flush before waiting on the peer.
#[derive(Debug)]
pub struct MseStream<S> {
    inner: S,
    prefix: Bytes,
    cipher: Option<CipherSession>,
    staged: BytesMut,
}

impl<S> MseStream<S> {
    /// A pass-through channel.
    pub fn plain(inner: S, prefix: Bytes) -> Self {
        Self {
            inner,
            prefix,
            cipher: None,
            staged: BytesMut::new(),
        }
    }

    /// A channel that applies `cipher` to all further traffic.
    pub fn encrypted(inner: S, prefix: Bytes, cipher: CipherSession) -> Self {
        Self {
            inner,
            prefix,
            cipher: Some(cipher),
            staged: BytesMut::new(),
        }
    }

    pub fn method(&self) -> CryptoMethod {
        if self.cipher.is_some() {
            CryptoMethod::Rc4
        } else {
            CryptoMethod::Plaintext
        }
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Plaintext bytes buffered ahead of the delegate.
    pub fn buffered(&self) -> &[u8] {
        &self.prefix
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Splits into the delegate, buffered plaintext and the cipher state.
    ///
    /// Fails if encrypted bytes are still staged; flush first.
    pub fn into_parts(self) -> io::Result<(S, Bytes, Option<CipherSession>)> {
        if !self.staged.is_empty() {
            return Err(io::Error::other(format!(
                "{} encrypted bytes not flushed",
                self.staged.len()
            )));
        }
        Ok((self.inner, self.prefix, self.cipher))
    }
}

impl<S: AsyncWrite + Unpin> MseStream<S> {
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        while !self.staged.is_empty() {
            let n = ready!(Pin::new(&mut self.inner).poll_write(cx, &self.staged))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            self.staged.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for MseStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.prefix.is_empty() {
            let n = this.prefix.len().min(buf.remaining());
            buf.put_slice(&this.prefix.split_to(n));
            return Poll::Ready(Ok(()));
        }

        let start = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if let Some(cipher) = this.cipher.as_mut() {
            cipher.decrypt(&mut buf.filled_mut()[start..]);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for MseStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if this.cipher.is_none() {
            return Pin::new(&mut this.inner).poll_write(cx, data);
        }

        // At most one caller buffer is staged at a time.
        if !this.staged.is_empty() {
            ready!(this.poll_drain(cx))?;
        }

        let start = this.staged.len();
        this.staged.extend_from_slice(data);
        if let Some(cipher) = this.cipher.as_mut() {
            cipher.encrypt(&mut this.staged[start..]);
        }

        if let Poll::Ready(Err(e)) = this.poll_drain(cx) {
            return Poll::Ready(Err(e));
        }
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        ready!(this.poll_drain(cx))?;
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}
