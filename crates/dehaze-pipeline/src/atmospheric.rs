//! Atmospheric light estimation.
//!
//! The haziest pixels are the ones with the *brightest* dark channel.
//! The top [`CANDIDATE_FRACTION`] of them are collected, and the one
//! with the highest channel mean supplies the air-light color. Picking
//! the brightest candidate rather than the single brightest pixel in the
//! image keeps a lone saturated highlight from skewing the estimate.

use std::cmp::Ordering;

use crate::raster::{FloatImage, ScalarField};
use crate::types::AtmosphericLight;

/// Fraction of pixels (by dark-channel rank) considered as candidates.
pub const CANDIDATE_FRACTION: f64 = 0.001;

/// Number of candidate pixels for an image with `pixel_count` pixels.
///
/// `floor(pixel_count * CANDIDATE_FRACTION)`, but never less than one
/// so tiny images still get an estimate.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn candidate_count(pixel_count: usize) -> usize {
    ((pixel_count as f64 * CANDIDATE_FRACTION) as usize).max(1)
}

/// Row-major indices of the `count` pixels with the largest dark-channel
/// value, largest first. Ties go to the lower index.
#[must_use]
pub fn top_candidates(dark_channel: &ScalarField, count: usize) -> Vec<usize> {
    let values = dark_channel.as_slice();
    let mut indices: Vec<usize> = (0..values.len()).collect();
    let by_rank =
        |&a: &usize, &b: &usize| values[b].total_cmp(&values[a]).then_with(|| a.cmp(&b));

    let count = count.min(indices.len());
    if count == 0 {
        return Vec::new();
    }
    if count < indices.len() {
        indices.select_nth_unstable_by(count - 1, by_rank);
        indices.truncate(count);
    }
    indices.sort_unstable_by(by_rank);
    indices
}

/// Estimate the atmospheric light of a [0, 1]-normalized image from its
/// dark channel.
///
/// Returns `None` only for an empty image.
#[must_use]
pub fn estimate_atmospheric_light(
    image: &FloatImage,
    dark_channel: &ScalarField,
) -> Option<AtmosphericLight> {
    let count = candidate_count(dark_channel.as_slice().len());
    top_candidates(dark_channel, count)
        .into_iter()
        .map(|i| image.pixel_at(i))
        .fold(None, |best: Option<[f64; 3]>, pixel| match best {
            Some(b) if mean3(pixel).total_cmp(&mean3(b)) != Ordering::Greater => Some(b),
            _ => Some(pixel),
        })
        .map(AtmosphericLight)
}

fn mean3(p: [f64; 3]) -> f64 {
    (p[0] + p[1] + p[2]) / 3.0
}
