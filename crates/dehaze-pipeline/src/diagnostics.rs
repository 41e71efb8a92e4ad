//! Pipeline diagnostics: timing and map statistics for each stage.
//!
//! [`dehaze_with_diagnostics`] runs the staged pipeline and records how
//! long each stage took along with a few numbers describing its output
//! (transmission ranges, sky pixel counts, the air-light color). Time is
//! read through the [`Clock`] trait so the crate itself stays free of
//! platform timers.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, StagedResult};
use crate::raster::RasterImage;
use crate::types::{DehazeConfig, DehazeError};

/// Source of timestamps for diagnostics.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Normalization plus dark channel.
    pub dark_channel: StageDiagnostics,
    /// Atmospheric light estimation.
    pub atmospheric_light: StageDiagnostics,
    /// Sky-aware transmission estimation.
    pub transmission: StageDiagnostics,
    /// Guided-filter refinement.
    pub refinement: StageDiagnostics,
    /// Clamp, radiance recovery and quantization.
    pub recovery: StageDiagnostics,
    /// Wall-clock duration of the whole run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary numbers for the whole run.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Dark channel statistics.
    DarkChannel {
        /// Erosion window side length.
        window_size: usize,
        /// Smallest dark-channel value.
        min: f64,
        /// Largest dark-channel value.
        max: f64,
        /// Mean dark-channel value.
        mean: f64,
    },
    /// Atmospheric light estimation.
    AtmosphericLight {
        /// Number of candidate pixels ranked by dark channel.
        candidate_count: usize,
        /// Chosen light, B, G, R.
        light: [f64; 3],
    },
    /// Sky-aware transmission estimation.
    Transmission {
        /// Haze-removal strength used.
        omega: f64,
        /// Pixels classified as sky.
        sky_pixel_count: usize,
        /// Smallest transmission value.
        min: f64,
        /// Largest transmission value.
        max: f64,
    },
    /// Guided-filter refinement.
    Refinement {
        /// Box window side length.
        window: usize,
        /// Regularization term.
        eps: f64,
        /// Smallest refined value.
        min: f64,
        /// Largest refined value.
        max: f64,
    },
    /// Radiance recovery.
    Recovery {
        /// Pixels classified as sky during recovery.
        sky_pixel_count: usize,
        /// Smallest final transmission.
        min_transmission: f64,
        /// Largest final transmission.
        max_transmission: f64,
    },
}

/// High-level summary for a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Image width in pixels.
    pub image_width: usize,
    /// Image height in pixels.
    pub image_height: usize,
    /// Total pixel count.
    pub pixel_count: usize,
    /// Estimated atmospheric light, B, G, R.
    pub atmospheric_light: [f64; 3],
    /// Pixels treated as sky during recovery.
    pub sky_pixel_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Dehaze Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        let [b, g, r] = self.summary.atmospheric_light;
        lines.push(String::new());
        lines.push(format!(
            "Air light (B,G,R): {b:.3}, {g:.3}, {r:.3}  |  Sky pixels: {}",
            self.summary.sky_pixel_count,
        ));

        lines.join("\n")
    }

    /// Stage diagnostics in pipeline order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 5] {
        [
            ("Dark Channel", &self.dark_channel),
            ("Atmospheric Light", &self.atmospheric_light),
            ("Transmission", &self.transmission),
            ("Refinement", &self.refinement),
            ("Recovery", &self.recovery),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::DarkChannel {
            window_size,
            min,
            max,
            mean,
        } => format!("window={window_size} range=[{min:.3}, {max:.3}] mean={mean:.3}"),
        StageMetrics::AtmosphericLight {
            candidate_count,
            light: [b, g, r],
        } => format!("{candidate_count} candidates -> ({b:.3}, {g:.3}, {r:.3})"),
        StageMetrics::Transmission {
            omega,
            sky_pixel_count,
            min,
            max,
        } => format!("omega={omega:.2} sky={sky_pixel_count} t=[{min:.3}, {max:.3}]"),
        StageMetrics::Refinement {
            window,
            eps,
            min,
            max,
        } => format!("window={window} eps={eps:e} t=[{min:.3}, {max:.3}]"),
        StageMetrics::Recovery {
            sky_pixel_count,
            min_transmission,
            max_transmission,
        } => format!(
            "sky={sky_pixel_count} t=[{min_transmission:.3}, {max_transmission:.3}]"
        ),
    }
}

/// Run the staged pipeline, timing every stage with `clock`.
///
/// # Errors
///
/// Returns the same errors as [`crate::dehaze`].
pub fn dehaze_with_diagnostics<C: Clock>(
    image: &RasterImage,
    config: &DehazeConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), DehazeError> {
    let run_start = clock.now();

    let start = clock.now();
    let dark = Pipeline::new(image.clone(), *config).compute_dark_channel()?;
    let dark_channel = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: dark.metrics(),
    };

    let start = clock.now();
    let air = dark.estimate_air_light()?;
    let atmospheric_light = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: air.metrics(),
    };

    let start = clock.now();
    let estimated = air.estimate_transmission();
    let transmission = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: estimated.metrics(),
    };

    let start = clock.now();
    let refined = estimated.refine()?;
    let refinement = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: refined.metrics(),
    };

    let start = clock.now();
    let recovered = refined.recover();
    let recovery = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: recovered.metrics(),
    };

    let staged = recovered.into_result();
    let total_duration = clock.elapsed(&run_start);

    let summary = PipelineSummary {
        image_width: staged.dimensions.width,
        image_height: staged.dimensions.height,
        pixel_count: staged.dimensions.pixel_count(),
        atmospheric_light: staged.atmospheric_light.channels(),
        sky_pixel_count: staged.recovery_sky.count(),
    };

    Ok((
        staged,
        PipelineDiagnostics {
            dark_channel,
            atmospheric_light,
            transmission,
            refinement,
            recovery,
            total_duration,
            summary,
        },
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn tick_clock() -> TickClock {
        TickClock {
            ticks: Cell::new(0),
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let image = RasterImage::from_fn(20, 20, |x, _| {
            if x < 10 { [240, 235, 230] } else { [70, 90, 110] }
        });
        let (staged, diag) =
            dehaze_with_diagnostics(&image, &DehazeConfig::default(), &tick_clock()).unwrap();

        assert_eq!(diag.summary.pixel_count, 400);
        assert_eq!(diag.summary.atmospheric_light, staged.atmospheric_light.channels());
        for (_, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1));
        }
        assert!(diag.total_duration >= Duration::from_millis(5));
        assert!(matches!(
            diag.refinement.metrics,
            StageMetrics::Refinement { window: 60, .. }
        ));
    }

    #[test]
    fn diagnostics_propagate_config_errors() {
        let image = RasterImage::from_fn(4, 4, |_, _| [1, 2, 3]);
        let config = DehazeConfig {
            omega: 0.0,
            ..DehazeConfig::default()
        };
        let result = dehaze_with_diagnostics(&image, &config, &tick_clock());
        assert!(matches!(result, Err(DehazeError::InvalidConfig(_))));
    }

    #[test]
    fn report_lists_stages() {
        let image = RasterImage::from_fn(12, 12, |_, y| [(y * 20) as u8, 100, 150]);
        let (_, diag) =
            dehaze_with_diagnostics(&image, &DehazeConfig::default(), &tick_clock()).unwrap();
        let report = diag.report();
        assert!(report.contains("Dehaze Diagnostics Report"));
        assert!(report.contains("Atmospheric Light"));
        assert!(report.contains("Refinement"));
        assert!(report.contains("12x12 (144 pixels)"));
    }

    #[test]
    fn diagnostics_round_trip_through_json() {
        let image = RasterImage::from_fn(8, 8, |_, _| [120, 130, 140]);
        let (_, diag) =
            dehaze_with_diagnostics(&image, &DehazeConfig::default(), &tick_clock()).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: PipelineDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary.pixel_count, 64);
        assert!(matches!(
            back.recovery.metrics,
            StageMetrics::Recovery { sky_pixel_count: 0, .. }
        ));
        assert!(back.total_duration > Duration::ZERO);
    }
}
