use image::RgbImage;

/// A single decoded video frame with its position in the stream.
pub struct Frame {
    pub image: RgbImage,
    /// Index of the frame from the start of the stream (0-based).
    pub frame_number: u32,
    /// `frame_number / native fps`.
    pub timestamp_seconds: f64,
}
