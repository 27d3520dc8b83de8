//! Perceptual per-pixel difference, delegated to `pixelmatch`

use std::io::Cursor;

use image::RgbaImage;

use crate::error::{E2eError, E2eResult};
use crate::visual::encode_png;

/// Options for [`pixel_diff`]
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Matching threshold on a 0..1 scale; smaller is more sensitive.
    pub threshold: f64,

    /// Count antialiased pixels as differences instead of ignoring them.
    pub include_aa: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            include_aa: false,
        }
    }
}

impl From<DiffOptions> for pixelmatch::Options {
    fn from(options: DiffOptions) -> Self {
        pixelmatch::Options {
            threshold: options.threshold,
            include_aa: options.include_aa,
            ..Default::default()
        }
    }
}

/// Output of a pixel comparison
#[derive(Debug)]
pub struct PixelDiff {
    /// Number of pixels outside the threshold
    pub diff_pixels: u64,

    /// PNG visualization with the same dimensions as the inputs
    pub png: Vec<u8>,
}

/// Compare two equal-sized RGBA rasters.
pub fn pixel_diff(actual: &RgbaImage, expected: &RgbaImage, options: DiffOptions) -> E2eResult<PixelDiff> {
    if actual.dimensions() != expected.dimensions() {
        return Err(E2eError::DimensionMismatch {
            actual: actual.dimensions(),
            expected: expected.dimensions(),
        });
    }

    let (width, height) = actual.dimensions();
    let actual_png = encode_png(actual)?;
    let expected_png = encode_png(expected)?;
    let mut output = Cursor::new(Vec::new());

    let diff_pixels = pixelmatch::pixelmatch(
        Cursor::new(actual_png.as_slice()),
        Cursor::new(expected_png.as_slice()),
        Some(&mut output),
        Some(width),
        Some(height),
        Some(options.into()),
    )
    .map_err(|e| E2eError::Diff(format!("{:?}", e)))?;

    Ok(PixelDiff {
        diff_pixels: diff_pixels as u64,
        png: output.into_inner(),
    })
}
