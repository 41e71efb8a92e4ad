//! Edge-preserving transmission refinement (guided filter).
//!
//! The raw transmission map is blocky because the dark channel is
//! computed over square patches, which shows up as halos around object
//! edges in the recovered image. The guided filter fits a local affine
//! model `output ≈ a * guide + b` inside every window by least squares:
//!
//! ```text
//! a = cov(guide, input) / (var(guide) + eps)
//! b = mean(input) - a * mean(guide)
//! ```
//!
//! then averages `a` and `b` over the same window and evaluates the
//! averaged model at each pixel. Where the guide has an edge, `a` is
//! large and the edge passes through; in flat regions `a` vanishes and
//! the output is a plain local mean.
//!
//! All local means come from [`box_mean`], which uses a summed-area
//! table so the cost does not depend on the window size.

use rayon::prelude::*;

use crate::grayscale::guidance_image;
use crate::raster::{RasterImage, ScalarField};
use crate::types::DehazeError;

/// Side length of the box window used when refining transmission.
pub const GUIDED_FILTER_WINDOW: usize = 60;

/// Regularization added to the guide variance when refining transmission.
pub const GUIDED_FILTER_EPS: f64 = 1e-4;

/// Mean over a `window` x `window` box around every pixel.
///
/// For an odd `window` the box is centered. For an even `window` the
/// anchor sits at `window / 2`, so the box reaches `window / 2` pixels
/// up/left and `window / 2 - 1` pixels down/right. Near the border the
/// box is clipped to the image and the mean is taken over the pixels
/// that remain, matching the clipping rule of
/// [`erode`](crate::dark_channel::erode).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn box_mean(field: &ScalarField, window: usize) -> ScalarField {
    let dims = field.dimensions();
    if dims.is_empty() || window <= 1 {
        return field.clone();
    }
    let (width, height) = (dims.width, dims.height);
    let before = window / 2;
    let after = window - 1 - before;

    let stride = width + 1;
    let mut integral = vec![0.0f64; (height + 1) * stride];
    for (y, row) in field.as_slice().chunks_exact(width).enumerate() {
        let mut row_sum = 0.0;
        for (x, &v) in row.iter().enumerate() {
            row_sum += v;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = vec![0.0; width * height];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let y0 = y.saturating_sub(before);
        let y1 = (y + after + 1).min(height);
        for (x, slot) in row.iter_mut().enumerate() {
            let x0 = x.saturating_sub(before);
            let x1 = (x + after + 1).min(width);
            let sum = integral[y1 * stride + x1] - integral[y0 * stride + x1]
                - integral[y1 * stride + x0]
                + integral[y0 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as f64;
            *slot = sum / count;
        }
    });

    ScalarField::from_parts(dims, out)
}

/// Filter `input` with the structure of `guide`.
///
/// # Errors
///
/// Returns [`DehazeError::DegenerateInput`] if `guide` and `input`
/// differ in size.
pub fn guided_filter(
    guide: &ScalarField,
    input: &ScalarField,
    window: usize,
    eps: f64,
) -> Result<ScalarField, DehazeError> {
    if guide.dimensions() != input.dimensions() {
        let (g, i) = (guide.dimensions(), input.dimensions());
        return Err(DehazeError::DegenerateInput(format!(
            "guide is {}x{} but input is {}x{}",
            g.width, g.height, i.width, i.height,
        )));
    }

    let mean_guide = box_mean(guide, window);
    let mean_input = box_mean(input, window);
    let corr_guide_input = box_mean(&zip_with(guide, input, |g, p| g * p), window);
    let corr_guide = box_mean(&guide.map(|g| g * g), window);

    let product_of_means = zip_with(&mean_guide, &mean_input, |g, p| g * p);
    let cov = zip_with(&corr_guide_input, &product_of_means, |c, m| c - m);
    let var = zip_with(&corr_guide, &mean_guide, |c, m| m.mul_add(-m, c));

    let a = zip_with(&cov, &var, |c, v| c / (v + eps));
    let b = zip_with(&a, &mean_guide, |a, m| a * m);
    let b = zip_with(&mean_input, &b, |p, am| p - am);

    let mean_a = box_mean(&a, window);
    let mean_b = box_mean(&b, window);

    let scaled = zip_with(&mean_a, guide, |a, g| a * g);
    Ok(zip_with(&scaled, &mean_b, |ag, b| ag + b))
}

/// Refine a transmission map using the luminance of the original image
/// as guidance, with [`GUIDED_FILTER_WINDOW`] and [`GUIDED_FILTER_EPS`].
///
/// # Errors
///
/// Returns [`DehazeError::DegenerateInput`] if the image and the map
/// differ in size.
pub fn refine_transmission(
    original: &RasterImage,
    transmission: &ScalarField,
) -> Result<ScalarField, DehazeError> {
    guided_filter(
        &guidance_image(original),
        transmission,
        GUIDED_FILTER_WINDOW,
        GUIDED_FILTER_EPS,
    )
}

/// Combine two equally sized fields value by value.
fn zip_with(
    a: &ScalarField,
    b: &ScalarField,
    f: impl Fn(f64, f64) -> f64 + Sync + Send,
) -> ScalarField {
    let data = a
        .as_slice()
        .par_iter()
        .zip(b.as_slice())
        .map(|(&x, &y)| f(x, y))
        .collect();
    ScalarField::from_parts(a.dimensions(), data)
}
