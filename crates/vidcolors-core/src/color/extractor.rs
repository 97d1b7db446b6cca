use image::{Rgb, RgbImage};
use indexmap::IndexMap;
use palette::{IntoColor, Lab, Srgb};
use tracing::debug;

use super::ColorCount;
use crate::error::Error;

pub type ExtractorError = Box<dyn std::error::Error + Send + Sync>;

/// Dominant-color routine run on each sampled frame.
pub trait ColorExtractor {
    /// Return up to `limit` colors with their pixel counts, most frequent first.
    fn extract(&self, image: &RgbImage, limit: usize) -> Result<Vec<ColorCount>, ExtractorError>;
}

/// Greedy tolerance clustering over exact pixel counts.
///
/// Every distinct RGB value starts as its own cluster. Walking from the most
/// frequent cluster down, each less frequent cluster within `tolerance` (CIE76
/// ΔE) of it is folded into it. A tolerance of 0 disables merging.
#[derive(Debug, Clone, Copy)]
pub struct ToleranceExtractor {
    tolerance: f64,
}

struct Cluster {
    rgb: [u8; 3],
    count: u64,
    merged: bool,
}

impl ToleranceExtractor {
    /// Fails with [`Error::InvalidConfig`] unless `tolerance` is finite and non-negative.
    pub fn new(tolerance: f64) -> crate::error::Result<Self> {
        if !(tolerance >= 0.0 && tolerance.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "tolerance must be a non-negative number, got {tolerance}"
            )));
        }
        Ok(Self { tolerance })
    }

    fn merge_similar(&self, clusters: &mut Vec<Cluster>) {
        let labs: Vec<Lab> = clusters.iter().map(|c| to_lab(c.rgb)).collect();

        for i in 0..clusters.len() {
            if clusters[i].merged {
                continue;
            }
            let (head, tail) = clusters.split_at_mut(i + 1);
            let larger = &mut head[i];

            for (offset, smaller) in tail.iter_mut().enumerate() {
                if smaller.merged {
                    continue;
                }
                if (cie76(labs[i], labs[i + 1 + offset]) as f64) < self.tolerance {
                    larger.count += smaller.count;
                    smaller.merged = true;
                }
            }
        }

        let before = clusters.len();
        clusters.retain(|c| !c.merged);
        clusters.sort_by(|a, b| b.count.cmp(&a.count));
        debug!(before, after = clusters.len(), tolerance = self.tolerance, "merged similar colors");
    }
}

impl ColorExtractor for ToleranceExtractor {
    fn extract(&self, image: &RgbImage, limit: usize) -> Result<Vec<ColorCount>, ExtractorError> {
        let mut counts: IndexMap<[u8; 3], u64> = IndexMap::new();
        for pixel in image.pixels() {
            *counts.entry(pixel.0).or_insert(0) += 1;
        }

        let mut clusters: Vec<Cluster> = counts
            .into_iter()
            .map(|(rgb, count)| Cluster {
                rgb,
                count,
                merged: false,
            })
            .collect();
        // Stable: equal counts keep first-seen pixel order.
        clusters.sort_by(|a, b| b.count.cmp(&a.count));

        if self.tolerance > 0.0 {
            self.merge_similar(&mut clusters);
        }

        clusters.truncate(limit);

        Ok(clusters
            .into_iter()
            .map(|c| ColorCount {
                rgb: Rgb(c.rgb),
                count: c.count,
            })
            .collect())
    }
}

fn to_lab(rgb: [u8; 3]) -> Lab {
    Srgb::new(rgb[0], rgb[1], rgb[2])
        .into_format::<f32>()
        .into_color()
}

/// Euclidean distance in CIELAB.
fn cie76(a: Lab, b: Lab) -> f32 {
    ((a.l - b.l).powi(2) + (a.a - b.a).powi(2) + (a.b - b.b).powi(2)).sqrt()
}
