use std::path::PathBuf;

/// Errors surfaced by the sampling and extraction pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The video could not be opened or probed at all.
    #[error("cannot read video source {}: {reason}", path.display())]
    UnreadableSource { path: PathBuf, reason: String },

    /// A frame could not be read from an already-open stream.
    #[error("failed to decode frame {frame_number}: {reason}")]
    Decode { frame_number: u32, reason: String },

    /// A sampled frame image could not be opened for color extraction.
    #[error("failed to open frame image {}", path.display())]
    FrameImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The color extraction routine failed on an image.
    #[error("color extraction failed for {}", path.display())]
    Clustering {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to save frame image {}", path.display())]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
