/// Callbacks from a pipeline to the socket adapter that drives it.
pub trait HandlerContext: Send + Sync {
    /// The message queue ran dry; more bytes should be read.
    fn request_read(&self);

    /// The outbound buffer is full; pending bytes should be written out.
    fn request_flush(&self);
}
