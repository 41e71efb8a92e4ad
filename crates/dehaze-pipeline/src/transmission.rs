//! Sky-aware initial transmission estimation.
//!
//! The transmission map `t(x)` is the fraction of scene light reaching
//! the camera unscattered. Dividing the image by the atmospheric light
//! and taking the dark channel of the result estimates the haze
//! thickness, so `t = 1 - omega * dark(I / A)`.
//!
//! Two adjustments follow:
//!
//! - sky pixels are raised to at least `sky_trans`, since the prior does
//!   not hold for sky and would otherwise darken it badly;
//! - everything else is damped by [`FOREGROUND_DAMPING`] for a milder
//!   result on foreground detail.

use crate::dark_channel::dark_channel;
use crate::raster::{FloatImage, ScalarField, SkyMask};
use crate::sky::classify_sky;
use crate::types::{AtmosphericLight, DehazeConfig};

/// Floor applied to each atmospheric-light component before dividing.
pub const AIR_LIGHT_FLOOR: f64 = 1e-6;

/// Multiplier applied to non-sky transmission.
pub const FOREGROUND_DAMPING: f64 = 0.9;

/// Divide every pixel by the atmospheric light, channel by channel.
///
/// Each light component is floored at [`AIR_LIGHT_FLOOR`] so a black
/// channel yields large finite values instead of infinities.
#[must_use]
pub fn normalize_by_light(image: &FloatImage, light: AtmosphericLight) -> FloatImage {
    let [lb, lg, lr] = light.channels().map(|c| c.max(AIR_LIGHT_FLOOR));
    image.map_pixels(|[b, g, r]| [b / lb, g / lg, r / lr])
}

/// `1 - omega * dark` for every pixel.
#[must_use]
pub fn raw_transmission(dark: &ScalarField, omega: f64) -> ScalarField {
    dark.map(|d| omega.mul_add(-d, 1.0))
}

/// Raise sky pixels to at least `sky_trans` and damp the rest.
#[must_use]
pub fn apply_sky_prior(transmission: &ScalarField, sky: &SkyMask, sky_trans: f64) -> ScalarField {
    let data = transmission
        .as_slice()
        .iter()
        .zip(sky.as_slice())
        .map(|(&t, &is_sky)| {
            if is_sky {
                t.max(sky_trans)
            } else {
                t * FOREGROUND_DAMPING
            }
        })
        .collect();
    ScalarField::from_parts(transmission.dimensions(), data)
}

/// Maps produced by [`estimate_transmission`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionEstimate {
    /// `1 - omega * dark(I / A)` before the sky prior.
    pub raw: ScalarField,
    /// Sky pixels of the input image.
    pub sky: SkyMask,
    /// Transmission after the sky prior.
    pub transmission: ScalarField,
}

/// Estimate the sky-aware transmission map of a [0, 1]-normalized image.
///
/// The sky mask is classified on `image` itself, not on the image
/// divided by the atmospheric light.
#[must_use]
pub fn estimate_transmission(
    image: &FloatImage,
    light: AtmosphericLight,
    config: &DehazeConfig,
) -> TransmissionEstimate {
    let scaled = normalize_by_light(image, light);
    let dark = dark_channel(&scaled, config.window_size);
    let raw = raw_transmission(&dark, config.omega);
    let sky = classify_sky(image, config.sky_thresh);
    let transmission = apply_sky_prior(&raw, &sky, config.sky_trans);
    TransmissionEstimate {
        raw,
        sky,
        transmission,
    }
}
