//! dehaze-pipeline: single-image haze removal with the dark channel prior (sans-IO).
//!
//! Turns a hazy 8-bit B, G, R image into a dehazed one through:
//! dark channel -> atmospheric light -> sky-aware transmission ->
//! guided-filter refinement -> radiance recovery.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! pixel buffers. Decoding, encoding and upload validation live in
//! `dehaze-io`.

pub mod atmospheric;
pub mod dark_channel;
pub mod diagnostics;
pub mod grayscale;
pub mod guided_filter;
pub mod pipeline;
pub mod raster;
pub mod recover;
pub mod sky;
pub mod transmission;
pub mod types;

pub use diagnostics::{Clock, PipelineDiagnostics, dehaze_with_diagnostics};
pub use pipeline::{Pipeline, StagedResult};
pub use raster::{FloatImage, RasterImage, ScalarField, SkyMask};
pub use types::{AtmosphericLight, DehazeConfig, DehazeError, Dimensions};

/// Remove haze from an image.
///
/// # Pipeline steps
///
/// 1. Validate the config and reject empty images
/// 2. Normalize to [0, 1] and compute the dark channel
/// 3. Estimate the atmospheric light
/// 4. Estimate sky-aware transmission
/// 5. Refine transmission with the guided filter
/// 6. Clamp transmission, recover radiance, quantize to 8 bits
///
/// # Errors
///
/// Returns [`DehazeError::InvalidConfig`] if `config` fails
/// [`DehazeConfig::validate`], and [`DehazeError::DegenerateInput`] if
/// the image has zero width or height.
pub fn dehaze(image: &RasterImage, config: &DehazeConfig) -> Result<RasterImage, DehazeError> {
    tracing::debug!(
        width = image.width(),
        height = image.height(),
        ?config,
        "dehazing image"
    );

    // 1-2. Validate, normalize and compute the dark channel.
    let dark = Pipeline::new(image.clone(), *config).compute_dark_channel()?;

    // 3. Atmospheric light.
    let air = dark.estimate_air_light()?;
    tracing::debug!(light = ?air.atmospheric_light().channels(), "estimated atmospheric light");

    // 4. Sky-aware transmission.
    let estimated = air.estimate_transmission();
    tracing::debug!(
        sky_pixels = estimated.sky().count(),
        range = ?estimated.transmission().min_max(),
        "estimated transmission"
    );

    // 5. Guided-filter refinement.
    let refined = estimated.refine()?;
    tracing::debug!(range = ?refined.refined_transmission().min_max(), "refined transmission");

    // 6. Recovery.
    let recovered = refined.recover();
    tracing::debug!(
        sky_pixels = recovered.sky().count(),
        range = ?recovered.final_transmission().min_max(),
        "recovered scene radiance"
    );

    Ok(recovered.into_output())
}

/// Run the pipeline to completion, keeping every intermediate.
///
/// # Errors
///
/// Returns the same errors as [`dehaze`].
pub fn dehaze_staged(
    image: &RasterImage,
    config: &DehazeConfig,
) -> Result<StagedResult, DehazeError> {
    use pipeline::PipelineStage;

    Pipeline::new(image.clone(), *config).complete()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;

    fn textured(width: usize, height: usize) -> RasterImage {
        RasterImage::from_fn(width, height, |x, y| {
            [(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8]
        })
    }

    #[test]
    fn dehaze_preserves_dimensions() {
        let image = textured(37, 23);
        let out = dehaze(&image, &DehazeConfig::default()).unwrap();
        assert_eq!(out.dimensions(), image.dimensions());
    }

    #[test]
    fn dehaze_rejects_invalid_config() {
        let config = DehazeConfig {
            sky_trans: 1.5,
            ..DehazeConfig::default()
        };
        let result = dehaze(&textured(8, 8), &config);
        assert!(matches!(result, Err(DehazeError::InvalidConfig(_))));
    }

    #[test]
    fn dehaze_rejects_empty_image() {
        let image = RasterImage::from_fn(5, 0, |_, _| [0, 0, 0]);
        let result = dehaze(&image, &DehazeConfig::default());
        assert!(matches!(result, Err(DehazeError::DegenerateInput(_))));
    }

    #[test]
    fn single_pixel_image_is_processed() {
        let image = RasterImage::from_fn(1, 1, |_, _| [40, 80, 120]);
        let out = dehaze(&image, &DehazeConfig::default()).unwrap();
        assert_eq!(out.dimensions(), Dimensions::new(1, 1));
    }

    #[test]
    fn staged_output_matches_direct_output() {
        let image = textured(31, 29);
        let config = DehazeConfig::default();
        let direct = dehaze(&image, &config).unwrap();
        let staged = dehaze_staged(&image, &config).unwrap();
        assert_eq!(staged.output, direct);
        assert_eq!(staged.original, image);
    }

    #[test]
    fn oversized_window_behaves_like_whole_image_window() {
        let image = textured(4, 4);
        let huge = DehazeConfig {
            window_size: usize::MAX,
            ..DehazeConfig::default()
        };
        let covering = DehazeConfig {
            window_size: 9,
            ..DehazeConfig::default()
        };
        assert_eq!(dehaze(&image, &huge).unwrap(), dehaze(&image, &covering).unwrap());
    }

    #[test]
    fn bright_gray_image_stays_neutral() {
        let image = RasterImage::from_fn(16, 16, |_, _| [200, 200, 200]);
        let out = dehaze(&image, &DehazeConfig::default()).unwrap();
        for [b, g, r] in out.pixels() {
            assert_eq!(b, g);
            assert_eq!(g, r);
            assert!((229..=231).contains(&b), "expected about 230, got {b}");
        }
    }
}
