//! Grayscale guidance image for transmission refinement.
//!
//! The guided filter is steered by the luminance of the *original* 8-bit
//! image. The standard luminance formula `0.299*R + 0.587*G + 0.114*B`
//! is rounded to an 8-bit level before scaling into [0, 1], so the
//! guidance carries the same quantization as an ordinary 8-bit
//! grayscale conversion.

use rayon::prelude::*;

use crate::raster::{BLUE, CHANNELS, GREEN, RED, RasterImage, ScalarField};

/// 8-bit luminance of a single `[b, g, r]` pixel.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn luma8(pixel: [u8; 3]) -> u8 {
    let y = 0.114f64.mul_add(
        f64::from(pixel[BLUE]),
        0.587f64.mul_add(f64::from(pixel[GREEN]), 0.299 * f64::from(pixel[RED])),
    );
    y.round().clamp(0.0, 255.0) as u8
}

/// Luminance of every pixel, scaled into [0, 1].
#[must_use]
pub fn guidance_image(image: &RasterImage) -> ScalarField {
    let data = image
        .as_raw()
        .par_chunks_exact(CHANNELS)
        .map(|p| f64::from(luma8([p[0], p[1], p[2]])) / 255.0)
        .collect();
    ScalarField::from_parts(image.dimensions(), data)
}
