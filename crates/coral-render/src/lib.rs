//! Last-mutation heatmap rendering for Coral grids.

use std::io::Cursor;
use std::path::Path;

use coral_core::Grid;
use image::{ImageFormat, RgbImage};
use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;
use thiserror::Error;
use tracing::debug;

pub mod palette;

pub use palette::{Hsv, build_palette};

/// Rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid mutation strength {0}; expected a finite, non-negative value")]
    InvalidStrength(f32),
    #[error("image buffer does not match a {0}×{0} grid")]
    Dimensions(usize),
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Palette walk parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Maximum per-step perturbation (degrees of hue).
    pub mutation_strength: f32,
    /// Seed for the palette walk.
    pub seed: u64,
}

impl RenderSettings {
    #[must_use]
    pub const fn new(mutation_strength: f32, seed: u64) -> Self {
        Self {
            mutation_strength,
            seed,
        }
    }

    fn validate(&self) -> Result<(), RenderError> {
        if !self.mutation_strength.is_finite() || self.mutation_strength < 0.0 {
            return Err(RenderError::InvalidStrength(self.mutation_strength));
        }
        Ok(())
    }
}

/// Color every cell by the iteration at which it last changed species.
///
/// The palette has `total_iterations + 1` entries; cells that never changed
/// take entry 0.
pub fn render_image(
    grid: &Grid,
    total_iterations: u32,
    settings: RenderSettings,
) -> Result<RgbImage, RenderError> {
    settings.validate()?;
    let mut rng = SmallRng::seed_from_u64(settings.seed);
    let palette = build_palette(
        total_iterations as usize + 1,
        settings.mutation_strength,
        &mut rng,
    );
    let last_entry = palette.len() - 1;

    let mut pixels = vec![0u8; grid.len() * 3];
    pixels
        .par_chunks_mut(3)
        .zip(grid.last_mutation().par_iter())
        .for_each(|(pixel, &frame)| {
            let color = palette[(frame as usize).min(last_entry)];
            pixel.copy_from_slice(&color);
        });

    let side = grid.world_size();
    debug!(side, colors = palette.len(), "rendered grid heatmap");
    RgbImage::from_raw(side as u32, side as u32, pixels).ok_or(RenderError::Dimensions(side))
}

/// Encode a rendered image as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Write a rendered image to `path` as PNG.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<(), RenderError> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
