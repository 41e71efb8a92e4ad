//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::dehaze`], which returns only the output image,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use dehaze_pipeline::{DehazeConfig, DehazeError, Pipeline, RasterImage};
//! # fn run(image: RasterImage) -> Result<(), DehazeError> {
//! let staged = Pipeline::new(image, DehazeConfig::default())
//!     .compute_dark_channel()?
//!     .estimate_air_light()?
//!     .estimate_transmission()
//!     .refine()?
//!     .recover()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state,
//! carrying all previously computed intermediates, so stages cannot be
//! skipped or reordered. Every stage keeps the normalized image and all
//! maps computed so far alive until [`Recovered::into_result`].
//! [`crate::dehaze`] drives the same stages and keeps only the output.

use crate::atmospheric::{candidate_count, estimate_atmospheric_light};
use crate::dark_channel::dark_channel;
use crate::diagnostics::StageMetrics;
use crate::guided_filter::{GUIDED_FILTER_EPS, GUIDED_FILTER_WINDOW, refine_transmission};
use crate::raster::{FloatImage, RasterImage, ScalarField, SkyMask};
use crate::recover::{Recovery, recover};
use crate::transmission::{TransmissionEstimate, estimate_transmission};
use crate::types::{AtmosphericLight, DehazeConfig, DehazeError, Dimensions};

/// Every intermediate produced by a full pipeline run.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// The input image.
    pub original: RasterImage,
    /// Dark channel of the normalized input.
    pub dark_channel: ScalarField,
    /// Estimated air-light color.
    pub atmospheric_light: AtmosphericLight,
    /// `1 - omega * dark(I / A)` before the sky prior.
    pub raw_transmission: ScalarField,
    /// Sky mask used during transmission estimation.
    pub estimation_sky: SkyMask,
    /// Transmission after the sky prior.
    pub estimated_transmission: ScalarField,
    /// Guided-filter output.
    pub refined_transmission: ScalarField,
    /// Sky mask used during recovery.
    pub recovery_sky: SkyMask,
    /// Transmission after the final clamp.
    pub final_transmission: ScalarField,
    /// The dehazed image.
    pub output: RasterImage,
    /// Image dimensions.
    pub dimensions: Dimensions,
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Store an image and config without processing anything.
    ///
    /// Validation happens in [`Pending::compute_dark_channel`].
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(image: RasterImage, config: DehazeConfig) -> Pending {
        Pending { config, image }
    }
}

/// Compile-time stage identity, shared by every typed stage.
pub trait PipelineStage: Sized {
    /// Short stage name (e.g. `"dark_channel"`).
    const NAME: &str;

    /// Zero-based position in the pipeline.
    const INDEX: usize;

    /// Run all remaining stages and return the [`StagedResult`].
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError`] if a remaining fallible stage fails.
    fn complete(self) -> Result<StagedResult, DehazeError>;
}

/// Total number of stages, including [`Pending`].
pub const STAGE_COUNT: usize = 6;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing.
#[must_use = "pipeline stages are consumed by advancing — call .compute_dark_channel() to continue"]
pub struct Pending {
    config: DehazeConfig,
    image: RasterImage,
}

impl Pending {
    /// The input image.
    #[must_use]
    pub const fn original(&self) -> &RasterImage {
        &self.image
    }

    /// The configuration this run will use.
    #[must_use]
    pub const fn config(&self) -> &DehazeConfig {
        &self.config
    }

    /// Validate the inputs, normalize the image, and compute its dark
    /// channel.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::InvalidConfig`] for an out-of-range config
    /// and [`DehazeError::DegenerateInput`] for a zero-sized image.
    pub fn compute_dark_channel(self) -> Result<DarkChannel, DehazeError> {
        self.config.validate()?;
        let dimensions = self.image.dimensions();
        if dimensions.is_empty() {
            return Err(DehazeError::DegenerateInput(format!(
                "image is {}x{}",
                dimensions.width, dimensions.height,
            )));
        }
        let normalized = self.image.to_normalized();
        let dark = dark_channel(&normalized, self.config.window_size);
        Ok(DarkChannel {
            config: self.config,
            original: self.image,
            normalized,
            dark,
        })
    }
}

// ─────────────────────── Stage 1: DarkChannel ────────────────────────

/// Pipeline state after the dark channel has been computed.
#[must_use = "pipeline stages are consumed by advancing — call .estimate_air_light() to continue"]
pub struct DarkChannel {
    config: DehazeConfig,
    original: RasterImage,
    normalized: FloatImage,
    dark: ScalarField,
}

impl DarkChannel {
    /// The dark channel of the normalized image.
    #[must_use]
    pub const fn dark_channel(&self) -> &ScalarField {
        &self.dark
    }

    /// The input scaled into [0, 1].
    #[must_use]
    pub const fn normalized(&self) -> &FloatImage {
        &self.normalized
    }

    /// Metrics describing this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = self.dark.min_max().unwrap_or((0.0, 0.0));
        StageMetrics::DarkChannel {
            window_size: self.config.window_size,
            min,
            max,
            mean: self.dark.mean(),
        }
    }

    /// Pick the atmospheric light from the haziest pixels.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::DegenerateInput`] if no candidate pixel
    /// exists, which cannot happen for an image that passed
    /// [`Pending::compute_dark_channel`].
    pub fn estimate_air_light(self) -> Result<AirLight, DehazeError> {
        let light = estimate_atmospheric_light(&self.normalized, &self.dark).ok_or_else(|| {
            DehazeError::DegenerateInput("no candidate pixels for atmospheric light".to_string())
        })?;
        Ok(AirLight {
            config: self.config,
            original: self.original,
            normalized: self.normalized,
            dark: self.dark,
            light,
        })
    }
}

// ──────────────────────── Stage 2: AirLight ──────────────────────────

/// Pipeline state after the atmospheric light has been estimated.
#[must_use = "pipeline stages are consumed by advancing — call .estimate_transmission() to continue"]
pub struct AirLight {
    config: DehazeConfig,
    original: RasterImage,
    normalized: FloatImage,
    dark: ScalarField,
    light: AtmosphericLight,
}

impl AirLight {
    /// The estimated atmospheric light.
    #[must_use]
    pub const fn atmospheric_light(&self) -> AtmosphericLight {
        self.light
    }

    /// Metrics describing this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::AtmosphericLight {
            candidate_count: candidate_count(self.dark.as_slice().len()),
            light: self.light.channels(),
        }
    }

    /// Estimate the sky-aware transmission map.
    pub fn estimate_transmission(self) -> TransmissionEstimated {
        let TransmissionEstimate {
            raw,
            sky,
            transmission,
        } = estimate_transmission(&self.normalized, self.light, &self.config);
        TransmissionEstimated {
            config: self.config,
            original: self.original,
            normalized: self.normalized,
            dark: self.dark,
            light: self.light,
            raw,
            sky,
            estimated: transmission,
        }
    }
}

// ─────────────────── Stage 3: TransmissionEstimated ──────────────────

/// Pipeline state after initial transmission estimation.
#[must_use = "pipeline stages are consumed by advancing — call .refine() to continue"]
pub struct TransmissionEstimated {
    config: DehazeConfig,
    original: RasterImage,
    normalized: FloatImage,
    dark: ScalarField,
    light: AtmosphericLight,
    raw: ScalarField,
    sky: SkyMask,
    estimated: ScalarField,
}

impl TransmissionEstimated {
    /// Transmission before the sky prior.
    #[must_use]
    pub const fn raw_transmission(&self) -> &ScalarField {
        &self.raw
    }

    /// Sky mask used by the sky prior.
    #[must_use]
    pub const fn sky(&self) -> &SkyMask {
        &self.sky
    }

    /// Transmission after the sky prior.
    #[must_use]
    pub const fn transmission(&self) -> &ScalarField {
        &self.estimated
    }

    /// Metrics describing this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = self.estimated.min_max().unwrap_or((0.0, 0.0));
        StageMetrics::Transmission {
            omega: self.config.omega,
            sky_pixel_count: self.sky.count(),
            min,
            max,
        }
    }

    /// Refine the transmission with the guided filter.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::DegenerateInput`] if the map and the image
    /// disagree in size, which cannot happen for maps built by earlier
    /// stages.
    pub fn refine(self) -> Result<Refined, DehazeError> {
        let refined = refine_transmission(&self.original, &self.estimated)?;
        Ok(Refined {
            config: self.config,
            original: self.original,
            normalized: self.normalized,
            dark: self.dark,
            light: self.light,
            raw: self.raw,
            sky: self.sky,
            estimated: self.estimated,
            refined,
        })
    }
}

// ──────────────────────── Stage 4: Refined ───────────────────────────

/// Pipeline state after guided-filter refinement.
#[must_use = "pipeline stages are consumed by advancing — call .recover() to continue"]
pub struct Refined {
    config: DehazeConfig,
    original: RasterImage,
    normalized: FloatImage,
    dark: ScalarField,
    light: AtmosphericLight,
    raw: ScalarField,
    sky: SkyMask,
    estimated: ScalarField,
    refined: ScalarField,
}

impl Refined {
    /// The refined transmission map.
    #[must_use]
    pub const fn refined_transmission(&self) -> &ScalarField {
        &self.refined
    }

    /// Metrics describing this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min, max) = self.refined.min_max().unwrap_or((0.0, 0.0));
        StageMetrics::Refinement {
            window: GUIDED_FILTER_WINDOW,
            eps: GUIDED_FILTER_EPS,
            min,
            max,
        }
    }

    /// Clamp the transmission and recover scene radiance.
    pub fn recover(self) -> Recovered {
        let recovery = recover(&self.normalized, self.light, &self.refined, &self.config);
        Recovered {
            original: self.original,
            dark: self.dark,
            light: self.light,
            raw: self.raw,
            sky: self.sky,
            estimated: self.estimated,
            refined: self.refined,
            recovery,
        }
    }
}

// ─────────────────────── Stage 5: Recovered ──────────────────────────

/// Final pipeline state.
pub struct Recovered {
    original: RasterImage,
    dark: ScalarField,
    light: AtmosphericLight,
    raw: ScalarField,
    sky: SkyMask,
    estimated: ScalarField,
    refined: ScalarField,
    recovery: Recovery,
}

impl Recovered {
    /// The dehazed image.
    #[must_use]
    pub const fn output(&self) -> &RasterImage {
        &self.recovery.output
    }

    /// Transmission after the final clamp.
    #[must_use]
    pub const fn final_transmission(&self) -> &ScalarField {
        &self.recovery.transmission
    }

    /// Sky mask recomputed for recovery.
    #[must_use]
    pub const fn sky(&self) -> &SkyMask {
        &self.recovery.sky
    }

    /// Metrics describing this stage.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        let (min_transmission, max_transmission) = self
            .recovery
            .transmission
            .min_max()
            .unwrap_or((0.0, 0.0));
        StageMetrics::Recovery {
            sky_pixel_count: self.recovery.sky.count(),
            min_transmission,
            max_transmission,
        }
    }

    /// Consume the pipeline and keep only the dehazed image.
    #[must_use]
    pub fn into_output(self) -> RasterImage {
        self.recovery.output
    }

    /// Consume the pipeline and return every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = self.original.dimensions();
        StagedResult {
            original: self.original,
            dark_channel: self.dark,
            atmospheric_light: self.light,
            raw_transmission: self.raw,
            estimation_sky: self.sky,
            estimated_transmission: self.estimated,
            refined_transmission: self.refined,
            recovery_sky: self.recovery.sky,
            final_transmission: self.recovery.transmission,
            output: self.recovery.output,
            dimensions,
        }
    }
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        self.compute_dark_channel()?.complete()
    }
}

impl PipelineStage for DarkChannel {
    const NAME: &str = "dark_channel";
    const INDEX: usize = 1;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        self.estimate_air_light()?.complete()
    }
}

impl PipelineStage for AirLight {
    const NAME: &str = "atmospheric_light";
    const INDEX: usize = 2;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        self.estimate_transmission().complete()
    }
}

impl PipelineStage for TransmissionEstimated {
    const NAME: &str = "transmission";
    const INDEX: usize = 3;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        self.refine()?.complete()
    }
}

impl PipelineStage for Refined {
    const NAME: &str = "refinement";
    const INDEX: usize = 4;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        self.recover().complete()
    }
}

impl PipelineStage for Recovered {
    const NAME: &str = "recovery";
    const INDEX: usize = 5;

    fn complete(self) -> Result<StagedResult, DehazeError> {
        Ok(self.into_result())
    }
}
