use crate::shared::frame::Frame;
use crate::shared::image_size::ImageSize;

/// A live stream of frames: a camera, or a file replayed as one.
///
/// Implementations own the underlying device or file handle. `close`
/// must release it and be safe to call more than once.
pub trait FrameSource: Send {
    /// Starts the stream, asking for `requested` resolution. Returns the
    /// resolution actually delivered, which may differ.
    fn open(&mut self, requested: ImageSize) -> Result<ImageSize, Box<dyn std::error::Error>>;

    /// Returns the current frame. Frame indices increase monotonically.
    fn read_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;

    fn close(&mut self);

    fn is_open(&self) -> bool;
}
