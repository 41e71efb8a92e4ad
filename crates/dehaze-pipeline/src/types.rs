//! Shared types for the dehazing pipeline.

use serde::{Deserialize, Serialize};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width * self.height
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The color of the haze, one component per channel in B, G, R order.
///
/// Estimated from a [0, 1]-normalized image, so every component lies
/// in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphericLight(pub [f64; 3]);

impl AtmosphericLight {
    /// Channel values in B, G, R order.
    #[must_use]
    pub const fn channels(self) -> [f64; 3] {
        self.0
    }

    /// Mean over the three channels.
    #[must_use]
    pub fn mean(self) -> f64 {
        self.0.iter().sum::<f64>() / 3.0
    }
}

/// Configuration for the dehazing pipeline.
///
/// Construct via [`DehazeConfig::try_new`] to get validation up front, or
/// build the struct directly and let [`crate::dehaze`] reject it before
/// any pixel work happens.
///
/// Out-of-range values are a caller error. The pipeline never clamps
/// them into range on the caller's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DehazeConfig {
    /// Haze-removal strength in (0, 1]. Higher values remove more haze.
    pub omega: f64,

    /// Minimum transmission floor in (0, 1). Prevents division by
    /// near-zero transmission in dense haze.
    pub t0: f64,

    /// Side length of the dark-channel neighborhood. Must be odd and at
    /// least 1. Larger windows give smoother, less detailed haze
    /// estimates.
    pub window_size: usize,

    /// Mean-intensity threshold in (0, 1) above which a low-chroma pixel
    /// is classified as sky.
    pub sky_thresh: f64,

    /// Target transmission in (0, 1] assigned to sky pixels.
    pub sky_trans: f64,
}

impl DehazeConfig {
    /// Default haze-removal strength.
    pub const DEFAULT_OMEGA: f64 = 0.75;
    /// Default minimum transmission.
    pub const DEFAULT_T0: f64 = 0.2;
    /// Default dark-channel window side length.
    pub const DEFAULT_WINDOW_SIZE: usize = 15;
    /// Default sky intensity threshold.
    pub const DEFAULT_SKY_THRESH: f64 = 0.7;
    /// Default sky transmission.
    pub const DEFAULT_SKY_TRANS: f64 = 0.85;

    /// Build a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::InvalidConfig`] if any parameter lies
    /// outside its documented domain.
    pub fn try_new(
        omega: f64,
        t0: f64,
        window_size: usize,
        sky_thresh: f64,
        sky_trans: f64,
    ) -> Result<Self, DehazeError> {
        let config = Self {
            omega,
            t0,
            window_size,
            sky_thresh,
            sky_trans,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter against its domain.
    ///
    /// NaN fails every check, since each condition is written as a
    /// positive range test.
    ///
    /// # Errors
    ///
    /// Returns [`DehazeError::InvalidConfig`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), DehazeError> {
        if !(self.omega > 0.0 && self.omega <= 1.0) {
            return Err(DehazeError::InvalidConfig(format!(
                "omega must be in (0, 1], got {}",
                self.omega
            )));
        }
        if !(self.t0 > 0.0 && self.t0 < 1.0) {
            return Err(DehazeError::InvalidConfig(format!(
                "t0 must be in (0, 1), got {}",
                self.t0
            )));
        }
        if self.window_size == 0 || self.window_size % 2 == 0 {
            return Err(DehazeError::InvalidConfig(format!(
                "window_size must be a positive odd integer, got {}",
                self.window_size
            )));
        }
        if !(self.sky_thresh > 0.0 && self.sky_thresh < 1.0) {
            return Err(DehazeError::InvalidConfig(format!(
                "sky_thresh must be in (0, 1), got {}",
                self.sky_thresh
            )));
        }
        if !(self.sky_trans > 0.0 && self.sky_trans <= 1.0) {
            return Err(DehazeError::InvalidConfig(format!(
                "sky_trans must be in (0, 1], got {}",
                self.sky_trans
            )));
        }
        Ok(())
    }
}

impl Default for DehazeConfig {
    fn default() -> Self {
        Self {
            omega: Self::DEFAULT_OMEGA,
            t0: Self::DEFAULT_T0,
            window_size: Self::DEFAULT_WINDOW_SIZE,
            sky_thresh: Self::DEFAULT_SKY_THRESH,
            sky_trans: Self::DEFAULT_SKY_TRANS,
        }
    }
}

/// Errors that can occur during dehazing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DehazeError {
    /// A configuration parameter is outside its documented domain.
    #[error("invalid dehaze configuration: {0}")]
    InvalidConfig(String),

    /// The input cannot be processed (zero-sized image, or a pixel
    /// buffer whose length does not match its dimensions).
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DehazeConfig::default().validate().is_ok());
    }

    #[test]
    fn try_new_accepts_boundary_values() {
        assert!(DehazeConfig::try_new(1.0, 0.01, 1, 0.5, 1.0).is_ok());
    }

    #[test]
    fn even_window_size_rejected() {
        let config = DehazeConfig {
            window_size: 14,
            ..DehazeConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("window_size"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn zero_window_size_rejected() {
        let config = DehazeConfig {
            window_size: 0,
            ..DehazeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DehazeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_parameters_rejected() {
        let bad = [
            DehazeConfig {
                omega: 0.0,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                omega: 1.5,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                t0: 0.0,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                t0: 1.0,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                sky_thresh: 1.0,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                sky_trans: 0.0,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                sky_trans: 1.2,
                ..DehazeConfig::default()
            },
            DehazeConfig {
                omega: f64::NAN,
                ..DehazeConfig::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(DehazeError::InvalidConfig(_))),
                "expected {config:?} to be rejected"
            );
        }
    }

    #[test]
    fn config_serde_round_trip_fills_defaults() {
        let config: DehazeConfig = serde_json::from_str(r#"{"omega": 0.9}"#).unwrap();
        assert!((config.omega - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.window_size, DehazeConfig::DEFAULT_WINDOW_SIZE);
    }

    #[test]
    fn atmospheric_light_mean() {
        let light = AtmosphericLight([0.3, 0.6, 0.9]);
        assert!((light.mean() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn dimensions_empty() {
        assert!(Dimensions::new(0, 5).is_empty());
        assert!(!Dimensions::new(2, 3).is_empty());
        assert_eq!(Dimensions::new(2, 3).pixel_count(), 6);
    }
}
