use image::{Rgb, RgbImage};

use super::frame::Frame;
use super::FrameSource;
use crate::error::{Error, Result};

/// In-memory stream of solid-color frames used in place of ffmpeg in tests.
pub(crate) struct SyntheticSource {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u32,
    reported_frames: Option<u64>,
    color: Rgb<u8>,
    fail_at: Option<u32>,
    next: u32,
    pub(crate) decoded: u32,
}

impl SyntheticSource {
    pub(crate) fn new(width: u32, height: u32, fps: f64, frame_count: u32) -> Self {
        Self {
            width,
            height,
            fps,
            frame_count,
            reported_frames: None,
            color: Rgb([0, 0, 0]),
            fail_at: None,
            next: 0,
            decoded: 0,
        }
    }

    pub(crate) fn with_color(mut self, color: Rgb<u8>) -> Self {
        self.color = color;
        self
    }

    /// Report `frames` as the container frame count while still yielding the real number.
    pub(crate) fn claiming_frames(mut self, frames: u64) -> Self {
        self.reported_frames = Some(frames);
        self
    }

    /// Make decoding of frame `frame_number` fail.
    pub(crate) fn failing_at(mut self, frame_number: u32) -> Self {
        self.fail_at = Some(frame_number);
        self
    }
}

impl FrameSource for SyntheticSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.reported_frames.unwrap_or(self.frame_count as u64)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next >= self.frame_count {
            return Ok(None);
        }
        let frame_number = self.next;
        if self.fail_at == Some(frame_number) {
            return Err(Error::Decode {
                frame_number,
                reason: "synthetic failure".into(),
            });
        }
        self.next += 1;
        self.decoded += 1;

        Ok(Some(Frame {
            image: RgbImage::from_pixel(self.width, self.height, self.color),
            frame_number,
            timestamp_seconds: frame_number as f64 / self.fps,
        }))
    }
}
