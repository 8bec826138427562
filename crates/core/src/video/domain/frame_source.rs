use crate::shared::frame::Frame;

/// A live sequence of captured frames (camera, stream, or file).
///
/// Frames carry a 1-based raw index that increases by one per captured
/// frame, whether or not the caller ends up processing it.
pub trait FrameSource {
    /// Next captured frame, or `Ok(None)` once the source has no more.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the underlying device or stream. Safe to call more than once.
    fn release(&mut self);
}
