use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::video::decoder::VideoDecoder;
use crate::video::frame::Frame;
use crate::video::FrameSource;

/// JPEG quality for sampled frames. Lower settings add enough block noise to
/// split solid regions into many distinct colors.
const JPEG_QUALITY: u8 = 95;

/// Suffix appended to the input path (minus extension) to name the frames directory.
const FRAMES_DIR_SUFFIX: &str = "_frames";

/// Parameters for sampling still frames out of a video.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Frames to save per second of video. Clamped to the native frame rate.
    pub sampling_rate: f64,
    /// Where to write the frames, or None for `<input>_frames` beside the input.
    pub frames_dir: Option<PathBuf>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 2.0,
            frames_dir: None,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_rate > 0.0 && self.sampling_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "sampling rate must be a positive number, got {}",
                self.sampling_rate
            )));
        }
        Ok(())
    }
}

/// A frame that was written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    pub path: PathBuf,
    pub frame_number: u32,
    pub timestamp_seconds: f64,
}

/// Evenly spaced target timestamps `k / rate` over the half-open range `[0, duration)`.
///
/// Targets are computed from their index on demand, so the schedule holds no buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSchedule {
    rate: f64,
    len: usize,
}

impl SampleSchedule {
    pub fn new(duration_seconds: f64, rate: f64) -> Self {
        if !(duration_seconds > 0.0 && duration_seconds.is_finite() && rate > 0.0 && rate.is_finite()) {
            return Self { rate, len: 0 };
        }

        // Start from the closed form, then settle float error against the exact bound.
        let mut len = (duration_seconds * rate).ceil() as usize;
        while len > 0 && (len - 1) as f64 / rate >= duration_seconds {
            len -= 1;
        }
        while (len as f64 / rate) < duration_seconds {
            len += 1;
        }

        Self { rate, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Target timestamp at `index`, or None past the end of the schedule.
    pub fn target(&self, index: usize) -> Option<f64> {
        (index < self.len).then(|| index as f64 / self.rate)
    }
}

/// The rate actually used: the requested rate, capped at the native frame rate.
pub fn effective_rate(requested: f64, native_fps: f64) -> f64 {
    if native_fps > 0.0 {
        requested.min(native_fps)
    } else {
        requested
    }
}

/// `<input without extension>_frames`, next to the input file.
pub fn default_frames_dir(input: &Path) -> PathBuf {
    let mut name: OsString = input.with_extension("").into_os_string();
    name.push(FRAMES_DIR_SUFFIX);
    PathBuf::from(name)
}

/// Format a timestamp as `HH-MM-SS.cc` (cc = centiseconds), safe for file names.
pub fn format_timestamp(seconds: f64) -> String {
    let total_cs = (seconds.max(0.0) * 100.0).round() as u64;
    let cs = total_cs % 100;
    let total_s = total_cs / 100;
    let h = total_s / 3600;
    let m = (total_s / 60) % 60;
    let s = total_s % 60;
    format!("{h:02}-{m:02}-{s:02}.{cs:02}")
}

/// Open `input`, sample it at the configured rate, and write the frames as JPEG files.
///
/// The source is probed before anything touches the filesystem, so an unreadable
/// input leaves no output directory behind.
pub fn extract_frames(input: &Path, config: &SamplerConfig) -> Result<Vec<SampledFrame>> {
    config.validate()?;

    let mut decoder = VideoDecoder::open(input)?;
    let frames_dir = config
        .frames_dir
        .clone()
        .unwrap_or_else(|| default_frames_dir(input));

    info!(
        ?input,
        ?frames_dir,
        width = decoder.width(),
        height = decoder.height(),
        "sampling video"
    );

    sample_to_dir(&mut decoder, config.sampling_rate, &frames_dir)
}

/// Create `frames_dir` if needed and sample `source` into it.
pub fn sample_to_dir<S: FrameSource>(
    source: &mut S,
    sampling_rate: f64,
    frames_dir: &Path,
) -> Result<Vec<SampledFrame>> {
    if !frames_dir.is_dir() {
        std::fs::create_dir_all(frames_dir).map_err(|source| Error::Io {
            path: frames_dir.to_path_buf(),
            source,
        })?;
        info!(?frames_dir, "created frames directory");
    }

    sample_frames(source, sampling_rate, frames_dir)
}

/// Walk `source` once and write the first frame at or after each target timestamp.
///
/// Decoded frame indices and target indices advance as a two-cursor merge. A
/// decode failure mid-stream ends sampling early and keeps the frames already
/// written.
pub fn sample_frames<S: FrameSource>(
    source: &mut S,
    sampling_rate: f64,
    frames_dir: &Path,
) -> Result<Vec<SampledFrame>> {
    let native_fps = source.fps();
    let rate = effective_rate(sampling_rate, native_fps);
    if rate < sampling_rate {
        info!(requested = sampling_rate, native_fps, "sampling rate clamped to native frame rate");
    }

    let schedule = SampleSchedule::new(source.duration_seconds(), rate);
    info!(
        duration_seconds = source.duration_seconds(),
        rate,
        target_count = schedule.len(),
        "sample schedule computed"
    );
    if schedule.is_empty() {
        warn!(native_fps, "clip has no duration, nothing to sample");
    }

    // The schedule length comes from container metadata, so it is not a safe capacity hint.
    let mut written: Vec<SampledFrame> = Vec::new();
    let mut next_target = 0;
    let mut last_stamp: Option<String> = None;

    while let Some(target) = schedule.target(next_target) {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, written = written.len(), "decode failed, stopping sampling early");
                break;
            }
        };

        if frame.timestamp_seconds < target {
            continue;
        }

        let stamp = format_timestamp(frame.timestamp_seconds);
        let name = frame_file_name(&stamp, &frame, last_stamp.as_deref());
        let path = frames_dir.join(&name);
        save_jpeg(&frame.image, &path)?;

        debug!(
            frame_number = frame.frame_number,
            timestamp_seconds = frame.timestamp_seconds,
            target,
            ?path,
            "saved sampled frame"
        );

        written.push(SampledFrame {
            path,
            frame_number: frame.frame_number,
            timestamp_seconds: frame.timestamp_seconds,
        });
        last_stamp = Some(stamp);
        next_target += 1;
    }

    if written.len() < schedule.len() {
        warn!(
            written = written.len(),
            expected = schedule.len(),
            "stream ended before every target was sampled"
        );
    }
    info!(sampled_frames = written.len(), ?frames_dir, "frame sampling complete");

    Ok(written)
}

fn save_jpeg(image: &RgbImage, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|source| Error::ImageWrite {
            path: path.to_path_buf(),
            source,
        })
}

/// Frames are visited in timestamp order, so only the previous stamp can collide.
fn frame_file_name(stamp: &str, frame: &Frame, previous_stamp: Option<&str>) -> String {
    if previous_stamp == Some(stamp) {
        format!("frame{stamp}-{}.jpg", frame.frame_number)
    } else {
        format!("frame{stamp}.jpg")
    }
}
