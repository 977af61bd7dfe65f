use crossbeam::queue::ArrayQueue;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use thiserror::Error;

/// The arena behind a [`BorrowedBuffer`] was already handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("buffer already released")]
pub struct Released;

/// A pool of equally sized, zero-initialized arenas.
///
/// Arenas are created up front; when the pool runs dry a fresh arena is
/// allocated instead of waiting. Returned arenas beyond the pool's capacity
/// are dropped.
pub struct BufferPool {
    arenas: ArrayQueue<Vec<u8>>,
    arena_size: usize,
}

impl BufferPool {
    pub fn new(arena_size: usize, arenas: usize) -> Arc<Self> {
        let pool = Arc::new(Self {
            arenas: ArrayQueue::new(arenas.max(1)),
            arena_size,
        });

        for _ in 0..arenas {
            let _ = pool.arenas.push(vec![0u8; arena_size]);
        }

        pool
    }

    /// Takes an arena out of the pool.
    pub fn borrow(self: &Arc<Self>) -> BorrowedBuffer {
        let arena = self
            .arenas
            .pop()
            .unwrap_or_else(|| vec![0u8; self.arena_size]);
        BorrowedBuffer::from_arena(arena, Arc::downgrade(self))
    }

    pub fn arena_size(&self) -> usize {
        self.arena_size
    }

    pub fn available(&self) -> usize {
        self.arenas.len()
    }

    fn give_back(&self, mut arena: Vec<u8>) {
        if arena.len() != self.arena_size {
            return;
        }
        arena.fill(0);
        let _ = self.arenas.push(arena);
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("arena_size", &self.arena_size)
            .field("available", &self.available())
            .finish()
    }
}

struct Shared {
    arena: Mutex<Option<Vec<u8>>>,
    capacity: usize,
    pool: Weak<BufferPool>,
}

impl Shared {
    fn release(&self) {
        if let Some(arena) = self.arena.lock().take() {
            if let Some(pool) = self.pool.upgrade() {
                pool.give_back(arena);
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.release();
    }
}

/// A handle to one arena.
///
/// Clones share the arena. Every access goes through [`lock`](Self::lock),
/// whose guard releases the lock when dropped, including on early returns.
/// The arena returns to its pool when the last handle is dropped or when
/// [`release`](Self::release) is called, after which `lock` fails.
#[derive(Clone)]
pub struct BorrowedBuffer {
    shared: Arc<Shared>,
}

impl BorrowedBuffer {
    /// A buffer that belongs to no pool.
    pub fn standalone(capacity: usize) -> Self {
        Self::from_arena(vec![0u8; capacity], Weak::new())
    }

    fn from_arena(arena: Vec<u8>, pool: Weak<BufferPool>) -> Self {
        Self {
            shared: Arc::new(Shared {
                capacity: arena.len(),
                arena: Mutex::new(Some(arena)),
                pool,
            }),
        }
    }

    pub fn lock(&self) -> Result<BufferGuard<'_>, Released> {
        let guard = self.shared.arena.lock();
        if guard.is_none() {
            return Err(Released);
        }
        Ok(BufferGuard { guard })
    }

    /// Hands the arena back early. Idempotent.
    pub fn release(&self) {
        self.shared.release();
    }

    pub fn is_released(&self) -> bool {
        self.shared.arena.lock().is_none()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl fmt::Debug for BorrowedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedBuffer")
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

/// Exclusive access to an arena for the guard's lifetime.
pub struct BufferGuard<'a> {
    guard: MutexGuard<'a, Option<Vec<u8>>>,
}

impl Deref for BufferGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // `lock` only builds a guard over a present arena.
        self.guard.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for BufferGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.guard.as_deref_mut().unwrap_or(&mut [])
    }
}
