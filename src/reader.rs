//! Deadline- and size-bounded reads.
//!
//! Every read performed while negotiating a connection goes through a
//! [`BoundedReader`]: it keeps reading until a minimum number of bytes has
//! arrived, refuses peers that send more than a maximum, and gives up once a
//! deadline has elapsed. A slow or hostile peer can therefore hold a
//! handshake for at most one deadline per step.
//!
//! [`BoundedReader::read_until`] additionally locates a synchronization
//! marker in the incoming bytes using a rolling hash ([`PatternScanner`]),
//! examining each byte exactly once no matter how the stream is chunked.
//!
//! # Examples
//!
//! ```
//! use rbit_transport::reader::BoundedReader;
//! use std::time::Duration;
//! use tokio::io::AsyncWriteExt;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut a, mut b) = tokio::io::duplex(64);
//! a.write_all(b"hello world").await?;
//!
//! let mut buf = [0u8; 64];
//! let reader = BoundedReader::new(5, 32, Duration::from_secs(1));
//! let n = reader.read(&mut b, &mut buf).await?;
//! assert_eq!(&buf[..n], b"hello world");
//! # Ok(())
//! # }
//! ```

mod bounded;
mod error;
mod pattern;

pub use bounded::{BoundedReader, PatternMatch};
pub use error::ReadError;
pub use pattern::PatternScanner;

#[cfg(test)]
mod tests;
