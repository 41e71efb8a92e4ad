//! Sky classification.
//!
//! Standard dark-channel dehazing over-darkens bright, low-contrast sky.
//! A pixel counts as sky when its channel mean exceeds the configured
//! threshold and its blue channel is at least [`BLUE_RATIO`] of that
//! mean (bright and not noticeably warm).

use rayon::prelude::*;

use crate::raster::{BLUE, CHANNELS, FloatImage, SkyMask};

/// Minimum ratio of the blue channel to the pixel mean for sky.
pub const BLUE_RATIO: f64 = 0.9;

/// Whether a single `[b, g, r]` pixel is sky-like.
#[must_use]
pub fn is_sky_pixel(pixel: [f64; 3], sky_thresh: f64) -> bool {
    let mean = (pixel[0] + pixel[1] + pixel[2]) / 3.0;
    mean > sky_thresh && pixel[BLUE] > mean * BLUE_RATIO
}

/// Classify every pixel of a [0, 1]-normalized image.
#[must_use]
pub fn classify_sky(image: &FloatImage, sky_thresh: f64) -> SkyMask {
    let data = image
        .as_raw()
        .par_chunks_exact(CHANNELS)
        .map(|p| is_sky_pixel([p[0], p[1], p[2]], sky_thresh))
        .collect();
    SkyMask::from_parts(image.dimensions(), data)
}
