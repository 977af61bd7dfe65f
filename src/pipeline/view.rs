use bytes::buf::Chain;
use bytes::{Buf, Bytes, BytesMut};

/// Two byte slices read as one sequence, without copying.
///
/// The pipeline hands codecs the unconsumed end of region A followed by
/// region B, so a message that wrapped past the end of the ring reads the
/// same as one that did not.
#[derive(Debug, Clone, Copy)]
pub struct SplicedView<'a> {
    head: &'a [u8],
    tail: &'a [u8],
}

impl<'a> SplicedView<'a> {
    pub fn new(head: &'a [u8], tail: &'a [u8]) -> Self {
        Self { head, tail }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.tail.is_empty()
    }

    /// Whether the view is split across two regions.
    pub fn is_spliced(&self) -> bool {
        !self.tail.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        match index.checked_sub(self.head.len()) {
            None => Some(self.head[index]),
            Some(i) => self.tail.get(i).copied(),
        }
    }

    /// Reads a big-endian `u32` starting at `offset`.
    pub fn read_u32_at(&self, offset: usize) -> Option<u32> {
        let mut bytes = [0u8; 4];
        self.copy_range(offset, &mut bytes).then(|| u32::from_be_bytes(bytes))
    }

    /// Fills `dst` with the bytes starting at `offset`. Returns false, leaving
    /// `dst` unspecified, if the view is too short.
    pub fn copy_range(&self, offset: usize, dst: &mut [u8]) -> bool {
        let end = match offset.checked_add(dst.len()) {
            Some(end) if end <= self.len() => end,
            _ => return false,
        };

        let split = self.head.len();
        if end <= split {
            dst.copy_from_slice(&self.head[offset..end]);
        } else if offset >= split {
            dst.copy_from_slice(&self.tail[offset - split..end - split]);
        } else {
            let (a, b) = dst.split_at_mut(split - offset);
            a.copy_from_slice(&self.head[offset..]);
            b.copy_from_slice(&self.tail[..end - split]);
        }
        true
    }

    /// Copies `len` bytes starting at `offset` into owned storage.
    pub fn to_bytes(&self, offset: usize, len: usize) -> Option<Bytes> {
        let mut out = BytesMut::zeroed(len);
        self.copy_range(offset, &mut out).then(|| out.freeze())
    }

    /// A [`Buf`] cursor over the whole view.
    pub fn buf(&self) -> Chain<&'a [u8], &'a [u8]> {
        self.head.chain(self.tail)
    }
}
