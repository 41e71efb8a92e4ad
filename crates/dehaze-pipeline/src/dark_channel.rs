//! Dark channel estimation.
//!
//! The dark channel of an image is the per-pixel minimum over the three
//! color channels, followed by a local minimum (morphological erosion)
//! over a square `window_size` x `window_size` neighborhood.
//!
//! The neighborhood is clipped to the image bounds: border pixels take
//! the minimum over whichever neighbors exist. A square window is
//! separable, so the erosion runs as a horizontal sliding-window minimum
//! over every row followed by the same pass over every column. Each pass
//! is linear in the row length regardless of window size.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::raster::{CHANNELS, FloatImage, ScalarField};

/// Per-pixel minimum across the three channels.
#[must_use]
pub fn channel_min(image: &FloatImage) -> ScalarField {
    let data = image
        .as_raw()
        .par_chunks_exact(CHANNELS)
        .map(|p| p[0].min(p[1]).min(p[2]))
        .collect();
    ScalarField::from_parts(image.dimensions(), data)
}

/// Local minimum over a square neighborhood of side `window_size`
/// centered on each pixel.
///
/// `window_size` is expected to be odd; an even value behaves like the
/// next odd size up. A `window_size` of 0 or 1 returns the field
/// unchanged. Windows larger than the image behave like a window that
/// covers the whole image.
#[must_use]
pub fn erode(field: &ScalarField, window_size: usize) -> ScalarField {
    let dims = field.dimensions();
    let radius = (window_size / 2).min(dims.width.max(dims.height));
    if dims.is_empty() || radius == 0 {
        return field.clone();
    }
    let (width, height) = (dims.width, dims.height);

    let mut rows = vec![0.0; width * height];
    rows.par_chunks_mut(width)
        .zip(field.as_slice().par_chunks(width))
        .for_each(|(out, src)| sliding_min(src, radius, out));

    // Columns become rows so the vertical pass can reuse the same kernel.
    let columns = transpose(&rows, width, height);
    let mut eroded = vec![0.0; width * height];
    eroded
        .par_chunks_mut(height)
        .zip(columns.par_chunks(height))
        .for_each(|(out, src)| sliding_min(src, radius, out));

    ScalarField::from_parts(dims, transpose(&eroded, height, width))
}

/// Dark channel of `image`: [`channel_min`] followed by [`erode`].
///
/// Works for any normalization. For a [0, 1] image the result lies in
/// [0, 1].
#[must_use]
pub fn dark_channel(image: &FloatImage, window_size: usize) -> ScalarField {
    erode(&channel_min(image), window_size)
}

/// Minimum of `src[i - radius ..= i + radius]` (clipped) for every `i`.
///
/// Keeps a deque of candidate indices whose values increase from front
/// to back; the front is always the minimum of the current window.
fn sliding_min(src: &[f64], radius: usize, out: &mut [f64]) {
    let n = src.len();
    let mut candidates: VecDeque<usize> = VecDeque::with_capacity(2 * radius + 1);
    let mut next = 0;

    for (i, slot) in out.iter_mut().enumerate() {
        let hi = (i + radius).min(n - 1);
        while next <= hi {
            while candidates.back().is_some_and(|&b| src[b] >= src[next]) {
                candidates.pop_back();
            }
            candidates.push_back(next);
            next += 1;
        }

        let lo = i.saturating_sub(radius);
        while candidates.front().is_some_and(|&f| f < lo) {
            candidates.pop_front();
        }

        *slot = candidates.front().map_or(src[i], |&f| src[f]);
    }
}

/// Transpose a row-major `height` x `width` buffer into `width` x `height`.
fn transpose(data: &[f64], width: usize, height: usize) -> Vec<f64> {
    let mut out = vec![0.0; data.len()];
    for (y, row) in data.chunks_exact(width).enumerate() {
        for (x, &v) in row.iter().enumerate() {
            out[x * height + y] = v;
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_precision_loss)]
mod tests {
    use super::*;

    /// Reference erosion: scan the clipped window directly.
    fn brute_force_erode(field: &ScalarField, window_size: usize) -> ScalarField {
        let (w, h) = (field.width(), field.height());
        let r = window_size / 2;
        ScalarField::from_fn(w, h, |x, y| {
            let mut m = f64::INFINITY;
            for yy in y.saturating_sub(r)..=(y + r).min(h - 1) {
                for xx in x.saturating_sub(r)..=(x + r).min(w - 1) {
                    m = m.min(field.get(xx, yy));
                }
            }
            m
        })
    }

    /// Deterministic pseudo-random values in [0, 1).
    fn scrambled_field(w: usize, h: usize) -> ScalarField {
        ScalarField::from_fn(w, h, |x, y| {
            let v = (x * 7919 + y * 104_729 + 13) % 1009;
            v as f64 / 1009.0
        })
    }

    #[test]
    fn channel_min_picks_smallest_channel() {
        let image = FloatImage::from_fn(2, 1, |x, _| {
            if x == 0 { [0.2, 0.5, 0.9] } else { [0.7, 0.1, 0.4] }
        });
        let min = channel_min(&image);
        assert_eq!(min.as_slice(), &[0.2, 0.1]);
    }

    #[test]
    fn window_of_one_is_identity() {
        let field = scrambled_field(9, 7);
        assert_eq!(erode(&field, 1), field);
    }

    #[test]
    fn single_dark_pixel_spreads_over_window() {
        let field = ScalarField::from_fn(9, 9, |x, y| if (x, y) == (4, 4) { 0.0 } else { 1.0 });
        let eroded = erode(&field, 3);
        for y in 0..9 {
            for x in 0..9 {
                let inside = (3..=5).contains(&x) && (3..=5).contains(&y);
                let expected = if inside { 0.0 } else { 1.0 };
                assert!(
                    (eroded.get(x, y) - expected).abs() < f64::EPSILON,
                    "({x},{y}) expected {expected}, got {}",
                    eroded.get(x, y),
                );
            }
        }
    }

    #[test]
    fn border_uses_clipped_neighborhood() {
        // Dark pixel in the corner reaches exactly `radius` pixels inward.
        let field = ScalarField::from_fn(6, 6, |x, y| if (x, y) == (0, 0) { 0.1 } else { 0.8 });
        let eroded = erode(&field, 5);
        assert!((eroded.get(2, 2) - 0.1).abs() < f64::EPSILON);
        assert!((eroded.get(3, 0) - 0.8).abs() < f64::EPSILON);
        assert!((eroded.get(0, 3) - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn matches_brute_force_on_scrambled_input() {
        for &(w, h, window) in &[(17, 11, 3), (17, 11, 7), (5, 23, 15), (1, 9, 5), (30, 2, 31)] {
            let field = scrambled_field(w, h);
            assert_eq!(
                erode(&field, window),
                brute_force_erode(&field, window),
                "mismatch for {w}x{h} window {window}"
            );
        }
    }

    #[test]
    fn window_larger_than_image_gives_global_minimum() {
        let field = scrambled_field(6, 4);
        let global = field.min_max().unwrap().0;
        let eroded = erode(&field, 99);
        assert!(eroded.as_slice().iter().all(|&v| (v - global).abs() < f64::EPSILON));
    }

    #[test]
    fn huge_window_is_clamped_to_image() {
        let field = scrambled_field(4, 4);
        let global = field.min_max().unwrap().0;
        for window in [usize::MAX, usize::MAX - 2, 1 << 31 | 1] {
            let eroded = erode(&field, window);
            assert!(eroded.as_slice().iter().all(|&v| (v - global).abs() < f64::EPSILON));
        }
    }

    #[test]
    fn dark_channel_of_uniform_image_is_constant() {
        let image = FloatImage::from_fn(12, 8, |_, _| [0.6, 0.7, 0.8]);
        let dark = dark_channel(&image, 15);
        assert!(dark.as_slice().iter().all(|&v| (v - 0.6).abs() < f64::EPSILON));
    }

    #[test]
    fn empty_field_is_returned_unchanged() {
        let field = ScalarField::filled(0, 0, 0.0);
        assert_eq!(erode(&field, 15).dimensions(), field.dimensions());
    }
}
