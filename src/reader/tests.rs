use super::*;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWriteExt, ReadBuf};

const TIMEOUT: Duration = Duration::from_secs(1);

/// Non-zero filler so that a run of zero bytes only appears where placed.
fn noise(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i as u8).wrapping_mul(31).wrapping_add(seed) % 251) + 1)
        .collect()
}

/// A reader that reports `WouldBlock` a few times before yielding its data.
struct Flaky {
    would_block: usize,
    data: Vec<u8>,
}

impl AsyncRead for Flaky {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.would_block > 0 {
            self.would_block -= 1;
            return Poll::Ready(Err(io::ErrorKind::WouldBlock.into()));
        }
        let n = self.data.len().min(buf.remaining());
        let chunk: Vec<u8> = self.data.drain(..n).collect();
        buf.put_slice(&chunk);
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_read_returns_what_arrived() {
    let (mut tx, mut rx) = tokio::io::duplex(64);
    tx.write_all(&[7u8; 15]).await.unwrap();

    let mut buf = [0u8; 64];
    let reader = BoundedReader::new(10, 20, TIMEOUT);
    let n = reader.read(&mut rx, &mut buf).await.unwrap();

    assert_eq!(n, 15);
    assert_eq!(&buf[..15], &[7u8; 15]);
    drop(tx);
}

#[tokio::test]
async fn test_read_excessive_burst() {
    let (mut tx, mut rx) = tokio::io::duplex(64);
    tx.write_all(&[1u8; 25]).await.unwrap();

    let mut buf = [0u8; 64];
    let reader = BoundedReader::new(10, 20, TIMEOUT);
    let err = reader.read(&mut rx, &mut buf).await.unwrap_err();

    assert!(matches!(err, ReadError::ExcessiveData { read: 25, max: 20 }));
}

#[tokio::test]
async fn test_read_end_of_stream() {
    let (mut tx, mut rx) = tokio::io::duplex(64);
    tx.write_all(&[1u8; 5]).await.unwrap();
    drop(tx);

    let mut buf = [0u8; 64];
    let reader = BoundedReader::new(10, 20, TIMEOUT);
    let err = reader.read(&mut rx, &mut buf).await.unwrap_err();

    assert!(matches!(err, ReadError::EndOfStream { read: 5, min: 10 }));
    assert!(!err.is_timing_failure());
}

#[tokio::test(start_paused = true)]
async fn test_read_deadline_elapses() {
    let (mut tx, mut rx) = tokio::io::duplex(64);
    tx.write_all(&[1u8; 5]).await.unwrap();

    let mut buf = [0u8; 64];
    let reader = BoundedReader::new(10, 20, TIMEOUT);
    let err = reader.read(&mut rx, &mut buf).await.unwrap_err();

    assert!(matches!(err, ReadError::InsufficientData { read: 5, min: 10 }));
    assert!(err.is_timing_failure());
    drop(tx);
}

#[tokio::test]
async fn test_read_accumulates_chunks() {
    let (mut tx, mut rx) = tokio::io::duplex(64);
    let writer = tokio::spawn(async move {
        for chunk in [&b"abc"[..], b"def", b"ghij"] {
            tx.write_all(chunk).await.unwrap();
            tokio::task::yield_now().await;
        }
        tx
    });

    let mut buf = [0u8; 32];
    let reader = BoundedReader::exact(10, TIMEOUT);
    let n = reader.read(&mut rx, &mut buf).await.unwrap();

    assert_eq!(&buf[..n], b"abcdefghij");
    drop(writer.await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_read_retries_would_block() {
    let mut flaky = Flaky {
        would_block: 3,
        data: b"0123456789".to_vec(),
    };

    let mut buf = [0u8; 16];
    let reader = BoundedReader::new(10, 16, TIMEOUT);
    let n = reader.read(&mut flaky, &mut buf).await.unwrap();

    assert_eq!(&buf[..n], b"0123456789");
}

#[tokio::test(start_paused = true)]
async fn test_read_would_block_until_deadline() {
    let mut flaky = Flaky {
        would_block: usize::MAX,
        data: Vec::new(),
    };

    let mut buf = [0u8; 16];
    let reader = BoundedReader::new(1, 16, TIMEOUT);
    let err = reader.read(&mut flaky, &mut buf).await.unwrap_err();

    assert!(matches!(err, ReadError::InsufficientData { read: 0, .. }));
}

#[tokio::test]
async fn test_read_buffer_too_small() {
    let (_tx, mut rx) = tokio::io::duplex(64);
    let mut buf = [0u8; 4];
    let reader = BoundedReader::new(10, 20, TIMEOUT);

    let err = reader.read(&mut rx, &mut buf).await.unwrap_err();
    assert!(matches!(err, ReadError::BufferTooSmall { len: 4, min: 10 }));
}

#[test]
fn test_scanner_finds_vc_across_chunks() {
    let mut stream = noise(300, 3);
    let offset = 173;
    stream.splice(offset..offset, [0u8; 8]);

    for chunk_size in [1, 2, 3, 7, 8, 64, stream.len()] {
        let mut scanner = PatternScanner::new(&[0u8; 8]);
        let mut found = None;
        let mut end = 0;
        while end < stream.len() && found.is_none() {
            end = (end + chunk_size).min(stream.len());
            found = scanner.scan(&stream[..end]);
        }
        assert_eq!(found, Some(offset), "chunk size {}", chunk_size);
    }
}

#[test]
fn test_scanner_examines_each_byte_once() {
    let stream = noise(100, 9);
    let mut scanner = PatternScanner::new(b"\x00\x00");

    assert_eq!(scanner.scan(&stream[..40]), None);
    assert_eq!(scanner.scanned(), 40);
    assert_eq!(scanner.scan(&stream), None);
    assert_eq!(scanner.scanned(), 100);
}

#[test]
fn test_scanner_ignores_permuted_window() {
    let mut scanner = PatternScanner::new(b"ab");
    assert_eq!(scanner.scan(b"xxbaab"), Some(4));
}

#[test]
fn test_scanner_pattern_at_start() {
    let mut scanner = PatternScanner::new(b"req1");
    assert_eq!(scanner.scan(b"req1 and more"), Some(0));
}

#[tokio::test]
async fn test_read_until_across_writes() {
    let mut stream = noise(200, 17);
    let offset = 121;
    stream.splice(offset..offset, [0u8; 8]);
    let total = stream.len();

    let (mut tx, mut rx) = tokio::io::duplex(16);
    let writer = tokio::spawn(async move {
        for chunk in stream.chunks(5) {
            tx.write_all(chunk).await.unwrap();
        }
        tx
    });

    let mut buf = vec![0u8; 512];
    let reader = BoundedReader::new(8, 300, TIMEOUT);
    let found = reader.read_until(&mut rx, &mut buf, 0, &[0u8; 8]).await.unwrap();

    assert_eq!(found.position, offset);
    assert_eq!(found.end(8), offset + 8);
    assert!(found.read >= offset + 8 && found.read <= total);
    writer.abort();
}

#[tokio::test]
async fn test_read_until_uses_prefilled_bytes() {
    let (_tx, mut rx) = tokio::io::duplex(16);
    let mut buf = vec![0u8; 64];
    buf[..6].copy_from_slice(b"xxsync");

    let reader = BoundedReader::new(4, 64, TIMEOUT);
    let found = reader.read_until(&mut rx, &mut buf, 6, b"sync").await.unwrap();

    assert_eq!(found, PatternMatch { read: 6, position: 2 });
}

#[tokio::test]
async fn test_read_until_sync_failure() {
    let (mut tx, mut rx) = tokio::io::duplex(256);
    tx.write_all(&noise(100, 1)).await.unwrap();

    let mut buf = vec![0u8; 256];
    let reader = BoundedReader::new(8, 64, TIMEOUT);
    let err = reader
        .read_until(&mut rx, &mut buf, 0, &[0u8; 8])
        .await
        .unwrap_err();

    assert!(matches!(err, ReadError::SyncFailure { .. }));
    assert!(err.is_timing_failure());
}

#[tokio::test]
async fn test_read_until_pattern_past_max() {
    let mut stream = noise(80, 5);
    stream.splice(60..60, [0u8; 8]);

    let (mut tx, mut rx) = tokio::io::duplex(256);
    tx.write_all(&stream).await.unwrap();

    let mut buf = vec![0u8; 256];
    let reader = BoundedReader::new(8, 64, TIMEOUT);
    let err = reader
        .read_until(&mut rx, &mut buf, 0, &[0u8; 8])
        .await
        .unwrap_err();

    assert!(matches!(err, ReadError::SyncFailure { .. }));
}
