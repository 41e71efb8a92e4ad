//! Scene radiance recovery and post-processing.
//!
//! Inverts the haze imaging model `I = J * t + A * (1 - t)` to get
//! `J = (I - A) / t + A`, after re-clamping the refined transmission
//! into a safe band (the guided filter can push values outside the
//! range the estimator produced). The recovered radiance is then
//! brightened per region and given a mild per-pixel contrast stretch
//! before quantizing back to 8 bits.

use rayon::prelude::*;

use crate::raster::{CHANNELS, FloatImage, RasterImage, ScalarField, SkyMask};
use crate::sky::classify_sky;
use crate::types::{AtmosphericLight, DehazeConfig};

/// Lower sky transmission bound, as a fraction of `sky_trans`.
pub const SKY_LOWER_FACTOR: f64 = 0.8;

/// Upper sky transmission bound, as a fraction of `sky_trans` (capped at 1).
pub const SKY_UPPER_FACTOR: f64 = 1.2;

/// Upper transmission bound for non-sky pixels.
pub const FOREGROUND_CEILING: f64 = 0.9;

/// Brightness gain applied to recovered non-sky pixels.
pub const FOREGROUND_GAIN: f64 = 1.1;

/// Strength of the per-pixel deviation-from-mean stretch.
pub const CONTRAST_GAIN: f64 = 0.1;

/// Output of [`recover`].
#[derive(Debug, Clone)]
pub struct Recovery {
    /// Sky mask recomputed from the normalized image.
    pub sky: SkyMask,
    /// Transmission after the final clamp, in `[t0, 1]`.
    pub transmission: ScalarField,
    /// The dehazed 8-bit image.
    pub output: RasterImage,
}

/// Clamp a refined transmission map into its final range.
///
/// Sky pixels go into `[0.8 * sky_trans, min(1.2 * sky_trans, 1)]`,
/// non-sky pixels into `[t0, 0.9]`. Every value is then floored at `t0`
/// so the map stays within `[t0, 1]` even when `0.8 * sky_trans < t0`.
#[must_use]
pub fn clamp_transmission(
    transmission: &ScalarField,
    sky: &SkyMask,
    config: &DehazeConfig,
) -> ScalarField {
    let sky_lo = SKY_LOWER_FACTOR * config.sky_trans;
    let sky_hi = (SKY_UPPER_FACTOR * config.sky_trans).min(1.0);
    let data = transmission
        .as_slice()
        .par_iter()
        .zip(sky.as_slice().par_iter())
        .map(|(&t, &is_sky)| {
            let clamped = if is_sky {
                t.max(sky_lo).min(sky_hi)
            } else {
                t.max(config.t0).min(FOREGROUND_CEILING)
            };
            clamped.max(config.t0)
        })
        .collect();
    ScalarField::from_parts(transmission.dimensions(), data)
}

/// Brightness gain for recovered sky pixels.
///
/// `2 - sky_trans` for `sky_trans <= 1`, otherwise `sky_trans` itself.
/// A validated config never takes the second branch.
#[must_use]
pub fn sky_brightness_gain(sky_trans: f64) -> f64 {
    if sky_trans <= 1.0 {
        2.0 - sky_trans
    } else {
        sky_trans
    }
}

/// Recover scene radiance from a [0, 1]-normalized image.
///
/// `transmission` must already be clamped (see [`clamp_transmission`]);
/// it is used as a divisor unchanged. Results are not clipped, so
/// values may fall outside [0, 1] until [`to_raster`].
#[must_use]
pub fn recover_radiance(
    image: &FloatImage,
    light: AtmosphericLight,
    transmission: &ScalarField,
    sky: &SkyMask,
    sky_trans: f64,
) -> FloatImage {
    let air = light.channels();
    let sky_gain = sky_brightness_gain(sky_trans);
    let data: Vec<f64> = image
        .as_raw()
        .par_chunks_exact(CHANNELS)
        .zip(transmission.as_slice().par_iter())
        .zip(sky.as_slice().par_iter())
        .flat_map_iter(|((pixel, &t), &is_sky)| {
            let gain = if is_sky { sky_gain } else { FOREGROUND_GAIN };
            let j: [f64; 3] = std::array::from_fn(|c| ((pixel[c] - air[c]) / t + air[c]) * gain);
            let mean = (j[0] + j[1] + j[2]) / 3.0;
            j.map(|v| (v - mean).mul_add(CONTRAST_GAIN, v))
        })
        .collect();
    FloatImage::from_parts(image.dimensions(), data)
}

/// Quantize a float image to 8 bits: scale by 255, clip to [0, 255],
/// then truncate toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_raster(image: &FloatImage) -> RasterImage {
    let data = image
        .as_raw()
        .par_iter()
        .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
        .collect();
    RasterImage::from_parts(image.dimensions(), data)
}

/// Run the whole recovery stage on a refined transmission map.
///
/// The sky mask is classified again from `image` with
/// `config.sky_thresh`.
#[must_use]
pub fn recover(
    image: &FloatImage,
    light: AtmosphericLight,
    refined: &ScalarField,
    config: &DehazeConfig,
) -> Recovery {
    let sky = classify_sky(image, config.sky_thresh);
    let transmission = clamp_transmission(refined, &sky, config);
    let radiance = recover_radiance(image, light, &transmission, &sky, config.sky_trans);
    Recovery {
        output: to_raster(&radiance),
        sky,
        transmission,
    }
}
