use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::aggregate;
use crate::color::extractor::ToleranceExtractor;
use crate::color::{ColorEntry, ColorOptions};
use crate::error::Result;
use crate::sampler::{self, SamplerConfig};
use crate::video::FrameSource;

/// Parameters for turning a video into a ranked color palette.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Frames to sample per second of video.
    pub sampling_rate: f64,
    /// Width frames are downscaled to before clustering.
    pub resize_width: u32,
    /// CIE76 distance under which colors in one frame are merged.
    pub tolerance: f64,
    /// Maximum colors kept per frame.
    pub limit: usize,
    /// Directory for sampled frames, or None for `<input>_frames`.
    pub frames_dir: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 2.0,
            resize_width: 900,
            tolerance: 0.0,
            limit: 100,
            frames_dir: None,
        }
    }
}

impl ExtractionConfig {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            sampling_rate: self.sampling_rate,
            frames_dir: self.frames_dir.clone(),
        }
    }

    pub fn color_options(&self) -> ColorOptions {
        ColorOptions {
            resize_width: self.resize_width,
            limit: self.limit,
        }
    }

    pub fn extractor(&self) -> Result<ToleranceExtractor> {
        ToleranceExtractor::new(self.tolerance)
    }

    pub fn validate(&self) -> Result<()> {
        self.sampler_config().validate()?;
        self.color_options().validate()?;
        self.extractor().map(|_| ())
    }
}

/// Sample `input`, extract colors from every sampled frame, and rank them.
///
/// All parameters are checked before the video is opened, so bad input
/// fails without writing anything.
pub fn run_pipeline(input: &Path, config: &ExtractionConfig) -> Result<Vec<ColorEntry>> {
    config.validate()?;

    info!(
        ?input,
        sampling_rate = config.sampling_rate,
        resize_width = config.resize_width,
        tolerance = config.tolerance,
        limit = config.limit,
        "pipeline starting"
    );

    let frames = sampler::extract_frames(input, &config.sampler_config())?;
    finish(frames, config)
}

/// Same as [`run_pipeline`] over an already-open source, writing frames to `frames_dir`.
pub fn run_on_source<S: FrameSource>(
    source: &mut S,
    frames_dir: &Path,
    config: &ExtractionConfig,
) -> Result<Vec<ColorEntry>> {
    config.validate()?;
    let frames = sampler::sample_to_dir(source, config.sampling_rate, frames_dir)?;
    finish(frames, config)
}

fn finish(frames: Vec<sampler::SampledFrame>, config: &ExtractionConfig) -> Result<Vec<ColorEntry>> {
    if frames.is_empty() {
        warn!("no frames were sampled, palette is empty");
    }

    let extractor = config.extractor()?;
    let palette = aggregate::aggregate_frames(&frames, &config.color_options(), &extractor)?;

    info!(
        sampled_frames = frames.len(),
        distinct_colors = palette.len(),
        "pipeline complete"
    );
    Ok(palette)
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::Error;
    use crate::video::synthetic::SyntheticSource;

    #[test]
    #[traced_test]
    fn all_black_video_is_one_color() {
        let dir = tempfile::tempdir().unwrap();
        // Two seconds at 4 fps, sampled at 2/s: four frames.
        let mut source = SyntheticSource::new(900, 600, 4.0, 8);

        let palette = run_on_source(&mut source, dir.path(), &ExtractionConfig::default()).unwrap();

        assert_eq!(
            palette,
            vec![ColorEntry {
                color: "000000".into(),
                weight: 900 * 600 * 4,
            }]
        );
    }

    #[test]
    fn downscaled_frames_weigh_resized_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(400, 200, 2.0, 4).with_color(Rgb([0, 0, 0]));
        let config = ExtractionConfig {
            sampling_rate: 1.0,
            resize_width: 100,
            ..Default::default()
        };

        let palette = run_on_source(&mut source, dir.path(), &config).unwrap();

        assert_eq!(palette.len(), 1);
        assert_eq!(palette[0].weight, 100 * 50 * 2);
    }

    #[test]
    fn empty_video_gives_empty_palette() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(16, 16, 30.0, 0);
        let palette = run_on_source(&mut source, dir.path(), &ExtractionConfig::default()).unwrap();
        assert!(palette.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_before_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let frames_dir = dir.path().join("frames");
        let mut source = SyntheticSource::new(16, 16, 30.0, 30);
        let config = ExtractionConfig {
            limit: 0,
            ..Default::default()
        };

        let err = run_on_source(&mut source, &frames_dir, &config).unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!frames_dir.exists());
        assert_eq!(source.decoded, 0);
    }

    #[test]
    fn negative_tolerance_is_rejected_before_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let frames_dir = dir.path().join("frames");
        let mut source = SyntheticSource::new(16, 16, 30.0, 30);
        let config = ExtractionConfig {
            tolerance: -2.0,
            ..Default::default()
        };

        let err = run_on_source(&mut source, &frames_dir, &config).unwrap_err();

        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(!frames_dir.exists());
        assert_eq!(source.decoded, 0);
    }

    #[test]
    fn missing_input_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("zoo.mp4");
        let err = run_pipeline(&input, &ExtractionConfig::default()).unwrap_err();
        assert!(matches!(err, Error::UnreadableSource { .. }));
        assert!(!dir.path().join("zoo_frames").exists());
    }
}
