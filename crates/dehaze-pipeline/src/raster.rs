//! Flat, row-major pixel buffers used by every pipeline stage.
//!
//! Color buffers store three interleaved channels in **B, G, R** order.
//! Every buffer carries its [`Dimensions`] and contiguous storage; stages
//! read them through shared references and return new buffers.
//!
//! Conversions to and from the `image` crate live here so downstream
//! crates can move between decoded files and pipeline buffers without
//! knowing about the channel order.

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::types::{DehazeError, Dimensions};

/// Index of the blue channel in a pixel.
pub const BLUE: usize = 0;
/// Index of the green channel in a pixel.
pub const GREEN: usize = 1;
/// Index of the red channel in a pixel.
pub const RED: usize = 2;

/// Number of interleaved channels in a color buffer.
pub const CHANNELS: usize = 3;

fn check_len(dimensions: Dimensions, len: usize, per_pixel: usize) -> Result<(), DehazeError> {
    let expected = dimensions.pixel_count() * per_pixel;
    if len == expected {
        Ok(())
    } else {
        Err(DehazeError::DegenerateInput(format!(
            "buffer of length {len} does not match {}x{} with {per_pixel} value(s) per pixel (expected {expected})",
            dimensions.width, dimensions.height,
        )))
    }
}

/// An 8-bit, three-channel (B, G, R) image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    dimensions: Dimensions,
    data: Vec<u8>,
}

impl RasterImage {
    pub(crate) const fn from_parts(dimensions: Dimensions, data: Vec<u8>) -> Self {
        Self { dimensions, data }
    }

    /// Wrap an interleaved B, G, R byte buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::DegenerateInput`] if `data.len()` is not
    /// `width * height * 3`.
    pub fn from_raw(width: usize, height: usize, data: Vec<u8>) -> Result<Self, DehazeError> {
        let dimensions = Dimensions::new(width, height);
        check_len(dimensions, data.len(), CHANNELS)?;
        Ok(Self { dimensions, data })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel, returning
    /// `[b, g, r]`.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [u8; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            dimensions: Dimensions::new(width, height),
            data,
        }
    }

    /// Convert from an `image` crate RGB buffer (swapping to B, G, R).
    #[must_use]
    pub fn from_rgb8(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .flat_map(|&Rgb([r, g, b])| [b, g, r])
            .collect();
        Self {
            dimensions: Dimensions::new(image.width() as usize, image.height() as usize),
            data,
        }
    }

    /// Convert to an `image` crate RGB buffer (swapping back to R, G, B).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_rgb8(&self) -> RgbImage {
        RgbImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let [b, g, r] = self.pixel(x as usize, y as usize);
            Rgb([r, g, b])
        })
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.dimensions.height
    }

    /// The `[b, g, r]` value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.dimensions.width + x) * CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    /// Iterate pixels in row-major order as `[b, g, r]`.
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|p| [p[BLUE], p[GREEN], p[RED]])
    }

    /// The raw interleaved buffer.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the image and return the raw interleaved buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Scale every sample into [0, 1].
    #[must_use]
    pub fn to_normalized(&self) -> FloatImage {
        FloatImage {
            dimensions: self.dimensions,
            data: self.data.iter().map(|&v| f64::from(v) / 255.0).collect(),
        }
    }
}

/// A floating-point, three-channel (B, G, R) image.
///
/// Samples are normally in [0, 1], but intermediate images (such as the
/// image divided by the atmospheric light) may exceed that range.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    dimensions: Dimensions,
    data: Vec<f64>,
}

impl FloatImage {
    pub(crate) const fn from_parts(dimensions: Dimensions, data: Vec<f64>) -> Self {
        Self { dimensions, data }
    }

    /// Wrap an interleaved B, G, R float buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::DegenerateInput`] if `data.len()` is not
    /// `width * height * 3`.
    pub fn from_raw(width: usize, height: usize, data: Vec<f64>) -> Result<Self, DehazeError> {
        let dimensions = Dimensions::new(width, height);
        check_len(dimensions, data.len(), CHANNELS)?;
        Ok(Self { dimensions, data })
    }

    /// Build an image by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> [f64; 3]) -> Self {
        let mut data = Vec::with_capacity(width * height * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            dimensions: Dimensions::new(width, height),
            data,
        }
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.dimensions.height
    }

    /// The `[b, g, r]` value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [f64; 3] {
        self.pixel_at(y * self.dimensions.width + x)
    }

    /// The `[b, g, r]` value at row-major pixel index `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i` is out of bounds.
    #[must_use]
    pub fn pixel_at(&self, i: usize) -> [f64; 3] {
        let base = i * CHANNELS;
        [self.data[base], self.data[base + 1], self.data[base + 2]]
    }

    /// Iterate pixels in row-major order as `[b, g, r]`.
    pub fn pixels(&self) -> impl Iterator<Item = [f64; 3]> + '_ {
        self.data
            .chunks_exact(CHANNELS)
            .map(|p| [p[BLUE], p[GREEN], p[RED]])
    }

    /// The raw interleaved buffer.
    #[must_use]
    pub fn as_raw(&self) -> &[f64] {
        &self.data
    }

    /// Apply `f` to every pixel, producing a new image.
    #[must_use]
    pub fn map_pixels(&self, f: impl Fn([f64; 3]) -> [f64; 3]) -> Self {
        let data = self.pixels().flat_map(f).collect();
        Self {
            dimensions: self.dimensions,
            data,
        }
    }
}

/// A single-channel `f64` map (dark channel, transmission, guided-filter terms).
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    dimensions: Dimensions,
    data: Vec<f64>,
}

impl ScalarField {
    /// Wrap a row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::DegenerateInput`] if `data.len()` is not
    /// `width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f64>) -> Result<Self, DehazeError> {
        let dimensions = Dimensions::new(width, height);
        check_len(dimensions, data.len(), 1)?;
        Ok(Self { dimensions, data })
    }

    /// A field with every value equal to `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            dimensions: Dimensions::new(width, height),
            data: vec![value; width * height],
        }
    }

    /// Build a field by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            dimensions: Dimensions::new(width, height),
            data,
        }
    }

    pub(crate) const fn from_parts(dimensions: Dimensions, data: Vec<f64>) -> Self {
        Self { dimensions, data }
    }

    /// Field dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.dimensions.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.dimensions.height
    }

    /// The value at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.dimensions.width + x]
    }

    /// Row-major values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Consume the field and return its row-major values.
    #[must_use]
    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Apply `f` to every value, producing a new field.
    #[must_use]
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            dimensions: self.dimensions,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Smallest and largest value, or `None` for an empty field.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// Mean value, or `0.0` for an empty field.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.data.iter().sum::<f64>() / self.data.len() as f64
        }
    }

    /// Render the field as an 8-bit grayscale image, mapping [0, 1] to
    /// [0, 255]. Values outside [0, 1] saturate.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn to_gray8(&self) -> GrayImage {
        GrayImage::from_fn(self.width() as u32, self.height() as u32, |x, y| {
            let v = self.get(x as usize, y as usize).clamp(0.0, 1.0);
            Luma([(v * 255.0).round() as u8])
        })
    }
}

/// Per-pixel sky classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkyMask {
    dimensions: Dimensions,
    data: Vec<bool>,
}

impl SkyMask {
    pub(crate) const fn from_parts(dimensions: Dimensions, data: Vec<bool>) -> Self {
        Self { dimensions, data }
    }

    /// Mask dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Whether the pixel at `(x, y)` is sky.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn is_sky(&self, x: usize, y: usize) -> bool {
        self.data[y * self.dimensions.width + x]
    }

    /// Row-major classification values.
    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }

    /// Number of sky pixels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&s| s).count()
    }

    /// Render the mask as a binary grayscale image (sky = 255).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_gray8(&self) -> GrayImage {
        let width = self.dimensions.width as u32;
        let height = self.dimensions.height as u32;
        GrayImage::from_fn(width, height, |x, y| {
            Luma([if self.is_sky(x as usize, y as usize) { 255 } else { 0 }])
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_rejects_wrong_length() {
        let result = RasterImage::from_raw(2, 2, vec![0; 11]);
        assert!(matches!(result, Err(DehazeError::DegenerateInput(_))));
    }

    #[test]
    fn rgb8_round_trip_swaps_channels() {
        let rgb = RgbImage::from_fn(3, 2, |x, y| {
            Rgb([10 + x as u8, 20 + y as u8, 30])
        });
        let raster = RasterImage::from_rgb8(&rgb);
        // Stored as B, G, R.
        assert_eq!(raster.pixel(1, 1), [30, 21, 11]);
        assert_eq!(raster.to_rgb8(), rgb);
    }

    #[test]
    fn normalized_scales_to_unit_range() {
        let raster = RasterImage::from_fn(1, 1, |_, _| [0, 51, 255]);
        let norm = raster.to_normalized();
        let [b, g, r] = norm.pixel(0, 0);
        assert!(b.abs() < 1e-12);
        assert!((g - 0.2).abs() < 1e-12);
        assert!((r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scalar_field_min_max_and_mean() {
        let field = ScalarField::from_vec(2, 2, vec![0.5, -1.0, 2.0, 0.5]).unwrap();
        assert_eq!(field.min_max(), Some((-1.0, 2.0)));
        assert!((field.mean() - 0.5).abs() < 1e-12);
        assert_eq!(ScalarField::filled(0, 0, 1.0).min_max(), None);
    }

    #[test]
    fn scalar_field_to_gray8_saturates() {
        let field = ScalarField::from_vec(3, 1, vec![-0.5, 0.5, 1.5]).unwrap();
        let gray = field.to_gray8();
        assert_eq!(gray.get_pixel(0, 0).0[0], 0);
        assert_eq!(gray.get_pixel(1, 0).0[0], 128);
        assert_eq!(gray.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn sky_mask_count_and_render() {
        let mask = SkyMask::from_parts(Dimensions::new(2, 1), vec![true, false]);
        assert_eq!(mask.count(), 1);
        let gray = mask.to_gray8();
        assert_eq!(gray.get_pixel(0, 0).0[0], 255);
        assert_eq!(gray.get_pixel(1, 0).0[0], 0);
    }
}
