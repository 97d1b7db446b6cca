use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use super::frame::Frame;
use super::FrameSource;
use crate::error::{Error, Result};

/// Stream metadata obtained by probing with ffprobe.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProbeResult {
    width: u32,
    height: u32,
    fps: f64,
    frame_count: u64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
enum ProbeParseError {
    #[error("ffprobe output is missing `{0}`")]
    Missing(&'static str),
    #[error("ffprobe reported an unparsable `{key}`: {value:?}")]
    Invalid { key: &'static str, value: String },
}

fn probe(path: &Path) -> Result<ProbeResult> {
    info!(?path, "probing video metadata with ffprobe");

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,r_frame_rate,nb_frames:stream_tags=rotate:stream_side_data=rotation:format=duration",
            "-of", "default=noprint_wrappers=1",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| unreadable(path, format!("failed to run ffprobe, is ffmpeg installed? {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(%stderr, ?path, "ffprobe failed");
        return Err(unreadable(path, format!("ffprobe failed: {}", stderr.trim())));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let info = parse_probe_output(&stdout).map_err(|e| {
        error!(%stdout, error = %e, "unexpected ffprobe output");
        unreadable(path, e.to_string())
    })?;

    if info.fps <= 0.0 {
        warn!(fps = info.fps, ?path, "video has non-positive fps, no frames will be sampled");
    }

    info!(
        width = info.width,
        height = info.height,
        fps = info.fps,
        frame_count = info.frame_count,
        "probe completed"
    );
    Ok(info)
}

/// Parse `key=value` lines as printed by `ffprobe -of default=noprint_wrappers=1`.
///
/// `nb_frames` is often `N/A` for containers without a frame index; the count
/// is then estimated from the container duration.
///
/// ffmpeg applies rotation metadata while decoding, so a quarter-turn rotation
/// swaps the reported coded width and height to match the frames on the pipe.
fn parse_probe_output(stdout: &str) -> std::result::Result<ProbeResult, ProbeParseError> {
    let mut width = None;
    let mut height = None;
    let mut rate = None;
    let mut nb_frames = None;
    let mut duration = None;
    let mut rotation = None;

    for line in stdout.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        match key {
            "width" => width = Some(value),
            "height" => height = Some(value),
            "r_frame_rate" => rate = Some(value),
            "nb_frames" => nb_frames = Some(value),
            "duration" => duration = Some(value),
            "rotation" | "TAG:rotate" => rotation = Some(value),
            _ => {}
        }
    }

    let coded_width: u32 = parse_field("width", width.ok_or(ProbeParseError::Missing("width"))?)?;
    let coded_height: u32 = parse_field("height", height.ok_or(ProbeParseError::Missing("height"))?)?;

    let degrees: f64 = match rotation {
        Some(value) => parse_field("rotation", value)?,
        None => 0.0,
    };
    let quarter_turn = (degrees.round() as i64).rem_euclid(180) == 90;
    let (width, height) = if quarter_turn {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };
    let rate = rate.ok_or(ProbeParseError::Missing("r_frame_rate"))?;

    let fps = if let Some((num, den)) = rate.split_once('/') {
        let num: f64 = parse_field("r_frame_rate", num)?;
        let den: f64 = parse_field("r_frame_rate", den)?;
        if den > 0.0 { num / den } else { 0.0 }
    } else {
        parse_field("r_frame_rate", rate)?
    };

    let frame_count = match nb_frames.and_then(|v| v.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = duration.ok_or(ProbeParseError::Missing("nb_frames"))?;
            let seconds: f64 = parse_field("duration", duration)?;
            (seconds * fps).round().max(0.0) as u64
        }
    };

    if width == 0 || height == 0 {
        return Err(ProbeParseError::Invalid {
            key: "width",
            value: format!("{width}x{height}"),
        });
    }

    Ok(ProbeResult {
        width,
        height,
        fps,
        frame_count,
    })
}

fn parse_field<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
) -> std::result::Result<T, ProbeParseError> {
    value.trim().parse().map_err(|_| ProbeParseError::Invalid {
        key,
        value: value.to_string(),
    })
}

fn decode_error(frame_number: u32, reason: String) -> Error {
    Error::Decode {
        frame_number,
        reason,
    }
}

fn unreadable(path: &Path, reason: String) -> Error {
    Error::UnreadableSource {
        path: PathBuf::from(path),
        reason,
    }
}

/// Decodes video frames by piping raw RGB24 data from the ffmpeg CLI.
pub struct VideoDecoder {
    child: Child,
    width: u32,
    height: u32,
    fps: f64,
    total_frames: u64,
    decoded: u32,
    frame_bytes: usize,
}

impl VideoDecoder {
    /// Probe and open a video file for sequential decoding.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(unreadable(path, "file does not exist".into()));
        }

        let info = probe(path)?;

        info!(?path, "spawning ffmpeg decoder process");

        let child = Command::new("ffmpeg")
            .args(["-i"])
            .arg(path)
            .args([
                "-f", "rawvideo",
                "-pix_fmt", "rgb24",
                "-v", "error",
                "pipe:1",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| unreadable(path, format!("failed to spawn ffmpeg, is ffmpeg installed? {e}")))?;

        let frame_bytes = (info.width as usize) * (info.height as usize) * 3;

        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            frame_bytes,
            "video decoder opened"
        );

        Ok(Self {
            child,
            width: info.width,
            height: info.height,
            fps: info.fps,
            total_frames: info.frame_count,
            decoded: 0,
            frame_bytes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl FrameSource for VideoDecoder {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.total_frames
    }

    /// Read the next frame from the ffmpeg pipe, or `None` if the video is finished.
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame_bytes = self.frame_bytes;
        let Some(stdout) = self.child.stdout.as_mut() else {
            return Err(decode_error(self.decoded, "ffmpeg stdout not available".into()));
        };

        let mut buf = vec![0u8; frame_bytes];
        let mut read = 0;

        while read < frame_bytes {
            match stdout.read(&mut buf[read..]) {
                Ok(0) => {
                    if read == 0 {
                        info!(total_frames = self.decoded, "video stream ended");
                        return Ok(None);
                    }
                    error!(
                        read_bytes = read,
                        expected_bytes = frame_bytes,
                        frame = self.decoded,
                        "ffmpeg stream ended mid-frame"
                    );
                    return Err(decode_error(self.decoded, format!(
                        "stream ended mid-frame (read {read}/{frame_bytes} bytes)"
                    )));
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!(frame = self.decoded, %e, "failed to read from ffmpeg pipe");
                    return Err(decode_error(self.decoded, format!("failed to read from ffmpeg pipe: {e}")));
                }
            }
        }

        let Some(image) = RgbImage::from_raw(self.width, self.height, buf) else {
            return Err(decode_error(self.decoded, "raw frame does not match probed dimensions".into()));
        };

        let frame_number = self.decoded;
        let timestamp_seconds = if self.fps > 0.0 {
            frame_number as f64 / self.fps
        } else {
            0.0
        };
        self.decoded += 1;

        debug!(frame_number, timestamp_seconds, "decoded frame");

        Ok(Some(Frame {
            image,
            frame_number,
            timestamp_seconds,
        }))
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        info!(total_frames = self.decoded, "closing video decoder");
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
