pub mod extractor;

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use extractor::ColorExtractor;

/// A color cluster found in one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCount {
    pub rgb: Rgb<u8>,
    pub count: u64,
}

/// A color identified by its lowercase 6-digit hex string, with its occurrence weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorEntry {
    pub color: String,
    pub weight: u64,
}

/// Per-image extraction parameters.
///
/// Clustering settings belong to the [`ColorExtractor`] itself.
#[derive(Debug, Clone, Copy)]
pub struct ColorOptions {
    /// Images wider than this are downscaled before clustering.
    pub resize_width: u32,
    /// Maximum number of colors kept per image.
    pub limit: usize,
}

impl Default for ColorOptions {
    fn default() -> Self {
        Self {
            resize_width: 400,
            limit: 20,
        }
    }
}

impl ColorOptions {
    pub fn validate(&self) -> Result<()> {
        if self.resize_width == 0 {
            return Err(Error::InvalidConfig("resize width must be at least 1".into()));
        }
        if self.limit == 0 {
            return Err(Error::InvalidConfig("color limit must be at least 1".into()));
        }
        Ok(())
    }
}

pub fn to_hex(rgb: Rgb<u8>) -> String {
    let [r, g, b] = rgb.0;
    format!("{r:02x}{g:02x}{b:02x}")
}

/// Shrink `image` to `max_width` wide, keeping the aspect ratio.
/// Images already at or under `max_width` are returned untouched.
pub fn downscale(image: RgbImage, max_width: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width <= max_width {
        return image;
    }

    let scale = max_width as f64 / width as f64;
    let new_height = ((height as f64 * scale) as u32).max(1);
    debug!(width, height, new_width = max_width, new_height, "downscaling image");
    imageops::resize(&image, max_width, new_height, FilterType::Lanczos3)
}

/// Open an image file, downscale it, and run `extractor` on it.
pub fn extract_image_colors<E: ColorExtractor + ?Sized>(
    path: &Path,
    options: &ColorOptions,
    extractor: &E,
) -> Result<Vec<ColorEntry>> {
    let image = image::open(path)
        .map_err(|source| Error::FrameImage {
            path: path.to_path_buf(),
            source,
        })?
        .into_rgb8();

    let image = downscale(image, options.resize_width);
    let colors = extractor
        .extract(&image, options.limit)
        .map_err(|source| Error::Clustering {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(?path, color_count = colors.len(), "extracted frame colors");

    Ok(colors
        .into_iter()
        .map(|c| ColorEntry {
            color: to_hex(c.rgb),
            weight: c.count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::extractor::{ExtractorError, ToleranceExtractor};
    use super::*;

    struct FailingExtractor;

    impl ColorExtractor for FailingExtractor {
        fn extract(&self, _: &RgbImage, _: usize) -> std::result::Result<Vec<ColorCount>, ExtractorError> {
            Err("cluster blew up".into())
        }
    }

    #[test]
    fn hex_is_lowercase_six_digits() {
        assert_eq!(to_hex(Rgb([0, 0, 0])), "000000");
        assert_eq!(to_hex(Rgb([255, 171, 1])), "ffab01");
    }

    #[test]
    fn narrow_image_is_not_resized() {
        let mut img = RgbImage::new(300, 200);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([x as u8, y as u8, (x ^ y) as u8]);
        }
        let resized = downscale(img.clone(), 400);
        assert_eq!(resized, img);

        let exact = downscale(img.clone(), 300);
        assert_eq!(exact, img);
    }

    #[test]
    fn wide_image_keeps_aspect_ratio() {
        let img = RgbImage::new(1920, 1080);
        let resized = downscale(img, 900);
        assert_eq!(resized.dimensions(), (900, 506));
    }

    #[test]
    fn very_flat_image_keeps_one_row() {
        let img = RgbImage::new(2000, 1);
        assert_eq!(downscale(img, 100).dimensions(), (100, 1));
    }

    #[test]
    fn options_validation() {
        assert!(ColorOptions::default().validate().is_ok());
        let bad = [
            ColorOptions { resize_width: 0, ..Default::default() },
            ColorOptions { limit: 0, ..Default::default() },
        ];
        for options in bad {
            assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn extracts_from_png_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.png");
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]));
        for x in 0..3 {
            for y in 0..10 {
                img.put_pixel(x, y, Rgb([0, 128, 255]));
            }
        }
        img.save(&path).unwrap();

        let extractor = ToleranceExtractor::new(0.0).unwrap();
        let colors = extract_image_colors(&path, &ColorOptions::default(), &extractor).unwrap();

        assert_eq!(
            colors,
            vec![
                ColorEntry { color: "ff0000".into(), weight: 70 },
                ColorEntry { color: "0080ff".into(), weight: 30 },
            ]
        );
    }

    #[test]
    fn missing_image_is_frame_error() {
        let err = extract_image_colors(
            Path::new("/nonexistent/frame.jpg"),
            &ColorOptions::default(),
            &ToleranceExtractor::new(0.0).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FrameImage { .. }));
    }

    #[test]
    fn extractor_failure_is_clustering_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("black.png");
        RgbImage::new(4, 4).save(&path).unwrap();

        let err = extract_image_colors(&path, &ColorOptions::default(), &FailingExtractor).unwrap_err();
        assert!(matches!(err, Error::Clustering { .. }));
    }
}
