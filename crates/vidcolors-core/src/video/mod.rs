pub mod decoder;
pub mod frame;

#[cfg(test)]
pub(crate) mod synthetic;

use crate::error::Result;
use frame::Frame;

/// A decoded video stream, read front to back exactly once.
pub trait FrameSource {
    /// Nominal frame rate of the stream.
    fn fps(&self) -> f64;

    /// Total number of frames the container reports.
    fn frame_count(&self) -> u64;

    /// Decode the next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Clip duration in seconds, 0.0 when the frame rate is unusable.
    fn duration_seconds(&self) -> f64 {
        let fps = self.fps();
        if fps > 0.0 && fps.is_finite() {
            self.frame_count() as f64 / fps
        } else {
            0.0
        }
    }
}
