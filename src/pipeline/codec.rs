use super::error::PipelineError;
use super::view::SplicedView;

/// Result of one decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<M> {
    /// The view does not hold a complete message yet.
    NeedMore,
    /// A message framed by the first `consumed` bytes of the view.
    Message { consumed: usize, message: M },
}

/// Protocol-specific framing plugged into a [`Pipeline`](super::Pipeline).
///
/// `decode` must report exactly how many bytes a message occupied. Reporting
/// zero or more bytes than the view holds is a protocol violation and fails
/// the pipeline.
pub trait MessageCodec {
    type Message;

    fn decode(&mut self, view: &SplicedView<'_>) -> Result<Decoded<Self::Message>, PipelineError>;

    /// Writes `message` to the front of `out` and returns its length, or
    /// `None` if `out` is too small.
    fn encode(
        &mut self,
        message: &Self::Message,
        out: &mut [u8],
    ) -> Result<Option<usize>, PipelineError>;
}
