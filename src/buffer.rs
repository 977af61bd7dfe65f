//! Pooled byte arenas and out-of-band piece hand-off.
//!
//! - [`BufferPool`] - fixed-size arenas recycled through a lock-free queue
//! - [`BorrowedBuffer`] - a shared handle to one arena, accessed through
//!   explicit lock guards
//! - [`BufferedPieceRegistry`] - a concurrent map that hands each piece
//!   block to exactly one consumer
//!
//! # Examples
//!
//! ```
//! use rbit_transport::buffer::BufferPool;
//!
//! let pool = BufferPool::new(4096, 2);
//! let buffer = pool.borrow();
//! {
//!     let mut guard = buffer.lock().unwrap();
//!     guard[..5].copy_from_slice(b"hello");
//! }
//! assert_eq!(pool.available(), 1);
//!
//! drop(buffer);
//! assert_eq!(pool.available(), 2);
//! ```

mod piece_registry;
mod pool;

pub use piece_registry::{BufferedPieceRegistry, PieceKey};
pub use pool::{BorrowedBuffer, BufferGuard, BufferPool, Released};
