use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// `(piece index, byte offset)` of a block.
pub type PieceKey = (u32, u32);

/// Piece blocks handed off outside the ring buffer.
///
/// A producer parks a block once with [`insert`](Self::insert); the first
/// consumer to [`take`](Self::take) it receives it and every later `take`
/// sees nothing. One registry is shared by all connections of a pool and
/// lives as long as its owner holds the `Arc`.
#[derive(Debug, Default)]
pub struct BufferedPieceRegistry {
    blocks: DashMap<PieceKey, Bytes>,
}

impl BufferedPieceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Parks `data` under `(piece, offset)` unless a block is already there.
    ///
    /// Returns false, leaving the existing block untouched, on a duplicate.
    pub fn insert(&self, piece: u32, offset: u32, data: Bytes) -> bool {
        match self.blocks.entry((piece, offset)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(data);
                true
            }
        }
    }

    /// Removes and returns the block at `(piece, offset)`.
    pub fn take(&self, piece: u32, offset: u32) -> Option<Bytes> {
        self.blocks.remove(&(piece, offset)).map(|(_, data)| data)
    }

    pub fn contains(&self, piece: u32, offset: u32) -> bool {
        self.blocks.contains_key(&(piece, offset))
    }

    /// Drops every parked block of `piece`, returning how many were dropped.
    pub fn discard_piece(&self, piece: u32) -> usize {
        let mut dropped = 0;
        self.blocks.retain(|&(index, _), _| {
            let keep = index != piece;
            if !keep {
                dropped += 1;
            }
            keep
        });
        dropped
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total bytes parked.
    pub fn parked_bytes(&self) -> usize {
        self.blocks.iter().map(|entry| entry.value().len()).sum()
    }
}
