use super::message::Message;
use crate::buffer::BufferedPieceRegistry;
use crate::constants::MAX_MESSAGE_SIZE;
use crate::pipeline::{Decoded, MessageCodec, PipelineError, SplicedView};
use bytes::Buf;
use std::sync::Arc;

/// Length-prefixed peer wire framing for a [`Pipeline`](crate::pipeline::Pipeline).
///
/// With a [`BufferedPieceRegistry`] attached, every decoded block is also
/// parked there under `(index, begin)` so a storage task can claim it
/// without going through the connection's message queue.
#[derive(Debug, Clone)]
pub struct PeerWireCodec {
    max_message_size: usize,
    pieces: Option<Arc<BufferedPieceRegistry>>,
}

impl PeerWireCodec {
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            pieces: None,
        }
    }

    pub fn with_piece_registry(mut self, pieces: Arc<BufferedPieceRegistry>) -> Self {
        self.pieces = Some(pieces);
        self
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    pub fn piece_registry(&self) -> Option<&Arc<BufferedPieceRegistry>> {
        self.pieces.as_ref()
    }
}

impl Default for PeerWireCodec {
    fn default() -> Self {
        Self::new(MAX_MESSAGE_SIZE)
    }
}

impl MessageCodec for PeerWireCodec {
    type Message = Message;

    fn decode(&mut self, view: &SplicedView<'_>) -> Result<Decoded<Message>, PipelineError> {
        let Some(length) = view.read_u32_at(0) else {
            return Ok(Decoded::NeedMore);
        };
        let length = length as usize;
        if length > self.max_message_size {
            return Err(PipelineError::MessageTooLarge {
                len: length,
                max: self.max_message_size,
            });
        }

        let consumed = 4 + length;
        if view.len() < consumed {
            return Ok(Decoded::NeedMore);
        }

        let mut frame = view.buf().take(consumed);
        let message =
            Message::decode(&mut frame).map_err(|e| PipelineError::Codec(e.to_string()))?;

        if let (Some(pieces), Message::Piece { index, begin, data }) = (&self.pieces, &message) {
            if !pieces.insert(*index, *begin, data.clone()) {
                tracing::debug!(index, begin, "duplicate block already parked");
            }
        }

        Ok(Decoded::Message { consumed, message })
    }

    fn encode(&mut self, message: &Message, out: &mut [u8]) -> Result<Option<usize>, PipelineError> {
        let len = message.encoded_len();
        if len - 4 > self.max_message_size {
            return Err(PipelineError::MessageTooLarge {
                len: len - 4,
                max: self.max_message_size,
            });
        }
        if len > out.len() {
            return Ok(None);
        }

        let mut dst = &mut out[..len];
        message.encode_into(&mut dst);
        Ok(Some(len))
    }
}
