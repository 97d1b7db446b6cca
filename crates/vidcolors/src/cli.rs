use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vidcolors", about = "Extract dominant color palettes from videos")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sample a video and rank the colors found across its frames.
    Extract {
        /// Path to the input video file (MP4, etc.).
        #[arg(short, long)]
        input: PathBuf,

        /// Frames to sample per second of video (capped at the native frame rate).
        #[arg(short, long, default_value_t = 2.0)]
        sampling_rate: f64,

        /// Frames wider than this are downscaled before color extraction.
        #[arg(short, long, default_value_t = 900)]
        resize: u32,

        /// Colors closer than this (CIE76 distance) are merged. 0 merges nothing.
        #[arg(short, long, default_value_t = 0.0)]
        tolerance: f64,

        /// Maximum colors kept per frame.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,

        /// Directory for sampled frames (default: `<input>_frames` beside the input).
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Also write the palette as JSON to this path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Only sample frames from a video and write them as JPEG files.
    Frames {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value_t = 2.0)]
        sampling_rate: f64,

        #[arg(long)]
        frames_dir: Option<PathBuf>,
    },

    /// Extract dominant colors from a single image.
    Image {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value_t = 400)]
        resize: u32,

        #[arg(short, long, default_value_t = 5.0)]
        tolerance: f64,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}
