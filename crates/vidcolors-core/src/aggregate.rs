use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{error, info};

use crate::color::extractor::ColorExtractor;
use crate::color::{extract_image_colors, ColorEntry, ColorOptions};
use crate::error::Result;
use crate::sampler::SampledFrame;

/// Extract colors from every frame in parallel, then merge them into one ranked list.
///
/// Any frame that fails to open or cluster aborts the whole call.
pub fn aggregate_frames<E>(
    frames: &[SampledFrame],
    options: &ColorOptions,
    extractor: &E,
) -> Result<Vec<ColorEntry>>
where
    E: ColorExtractor + Sync + ?Sized,
{
    info!(
        frame_count = frames.len(),
        resize_width = options.resize_width,
        limit = options.limit,
        "extracting colors from sampled frames"
    );

    // Collecting from an indexed parallel iterator keeps frame order.
    let per_frame: Vec<Vec<ColorEntry>> = frames
        .par_iter()
        .map(|frame| {
            extract_image_colors(&frame.path, options, extractor)
                .inspect_err(|e| error!(path = ?frame.path, error = %e, "frame color extraction failed"))
        })
        .collect::<Result<_>>()?;

    let palette = merge_colors(per_frame.into_iter().flatten());
    info!(distinct_colors = palette.len(), "color aggregation complete");
    Ok(palette)
}

/// Sum weights per color and sort descending by total weight.
///
/// Colors with equal totals stay in the order they were first seen.
pub fn merge_colors<I>(entries: I) -> Vec<ColorEntry>
where
    I: IntoIterator<Item = ColorEntry>,
{
    let mut totals: IndexMap<String, u64> = IndexMap::new();
    for entry in entries {
        *totals.entry(entry.color).or_insert(0) += entry.weight;
    }

    let mut ranked: Vec<ColorEntry> = totals
        .into_iter()
        .map(|(color, weight)| ColorEntry { color, weight })
        .collect();
    ranked.sort_by(|a, b| b.weight.cmp(&a.weight));
    ranked
}
