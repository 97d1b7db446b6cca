mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use vidcolors_core::color::extractor::ToleranceExtractor;
use vidcolors_core::color::{self, ColorEntry, ColorOptions};
use vidcolors_core::pipeline::{self, ExtractionConfig};
use vidcolors_core::sampler::{self, SamplerConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Extract {
            input,
            sampling_rate,
            resize,
            tolerance,
            limit,
            frames_dir,
            output,
        } => {
            info!(?input, sampling_rate, resize, tolerance, limit, "starting extraction");

            let config = ExtractionConfig {
                sampling_rate,
                resize_width: resize,
                tolerance,
                limit,
                frames_dir,
            };

            let palette = pipeline::run_pipeline(&input, &config).context("pipeline failed")?;

            if palette.is_empty() {
                warn!("no colors extracted from video");
            }

            print_palette(&palette);

            if let Some(output) = output {
                write_palette(&palette, &output)?;
            }

            info!(color_count = palette.len(), "extraction complete");
            Ok(())
        }
        cli::Command::Frames {
            input,
            sampling_rate,
            frames_dir,
        } => {
            let config = SamplerConfig {
                sampling_rate,
                frames_dir,
            };

            let frames =
                sampler::extract_frames(&input, &config).context("frame sampling failed")?;

            for frame in &frames {
                println!("{}", frame.path.display());
            }

            info!(frame_count = frames.len(), "frame sampling complete");
            Ok(())
        }
        cli::Command::Image {
            input,
            resize,
            tolerance,
            limit,
        } => {
            let options = ColorOptions {
                resize_width: resize,
                limit,
            };
            options.validate().context("invalid color options")?;

            let extractor = ToleranceExtractor::new(tolerance).context("invalid color options")?;
            let colors = color::extract_image_colors(&input, &options, &extractor)
                .with_context(|| format!("failed to extract colors from {}", input.display()))?;

            print_palette(&colors);
            Ok(())
        }
    }
}

fn print_palette(palette: &[ColorEntry]) {
    println!("Extracted Colors:");
    for entry in palette {
        println!("{}: {}", entry.color, entry.weight);
    }
}

/// Write the palette as pretty-printed JSON.
fn write_palette(palette: &[ColorEntry], output: &Path) -> Result<()> {
    info!(?output, color_count = palette.len(), "writing JSON output");

    let json = serde_json::to_string_pretty(palette).context("failed to encode palette")?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).context("failed to create output directory")?;
    }

    std::fs::write(output, json)
        .with_context(|| format!("failed to write {}", output.display()))?;

    info!(?output, "JSON output written");
    Ok(())
}
