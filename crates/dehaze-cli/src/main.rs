//! dehaze: remove haze from a photograph using the dark channel prior.
//!
//! Reads an image, runs the dehazing pipeline with configurable
//! parameters, writes the result, and prints per-stage diagnostics.
//! Useful for:
//!
//! - Dehazing single images from the command line
//! - Tuning `omega`, window size and the sky parameters
//! - Inspecting intermediate maps (dark channel, transmission, sky mask)
//! - Measuring per-stage durations across repeated runs
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin dehaze -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use dehaze_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use dehaze_pipeline::{DehazeConfig, RasterImage, StagedResult};
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

/// Remove atmospheric haze from a single image.
///
/// Writes the dehazed image and prints a per-stage timing report.
#[derive(Parser)]
#[command(name = "dehaze", version)]
struct Cli {
    /// Path to the hazy input image (PNG, JPEG, BMP, WebP, TIFF, GIF).
    image_path: PathBuf,

    /// Where to write the dehazed image. JPEG output uses quality 95;
    /// other extensions use the `image` crate's default encoder.
    #[arg(short, long, default_value = "dehazed_result.jpg")]
    output: PathBuf,

    /// Haze-removal strength in (0, 1].
    #[arg(long, default_value_t = DehazeConfig::DEFAULT_OMEGA)]
    omega: f64,

    /// Minimum transmission in (0, 1).
    #[arg(long, default_value_t = DehazeConfig::DEFAULT_T0)]
    t0: f64,

    /// Dark-channel window side length (odd).
    #[arg(long, default_value_t = DehazeConfig::DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    /// Mean intensity above which bright, neutral pixels count as sky.
    #[arg(long, default_value_t = DehazeConfig::DEFAULT_SKY_THRESH)]
    sky_thresh: f64,

    /// Target transmission for sky pixels.
    #[arg(long, default_value_t = DehazeConfig::DEFAULT_SKY_TRANS)]
    sky_trans: f64,

    /// Full dehaze config as a JSON string.
    ///
    /// When provided, all other parameter flags are ignored. Missing
    /// keys take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Write dark channel, transmission and sky mask PNGs to this directory.
    #[arg(long)]
    dump_maps: Option<PathBuf>,

    /// Log pipeline stages at debug level.
    #[arg(short, long)]
    verbose: bool,
}

/// Build a [`DehazeConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<DehazeConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(DehazeConfig {
        omega: cli.omega,
        t0: cli.t0,
        window_size: cli.window_size,
        sky_thresh: cli.sky_thresh,
        sky_trans: cli.sky_trans,
    })
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Could not install logger: {e}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match read_image(&cli.image_path) {
        Ok(image) => image,
        Err(msg) => {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        path = %cli.image_path.display(),
        width = image.width(),
        height = image.height(),
        "loaded image"
    );
    info!(?config, runs = cli.runs, "dehazing");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);
    let mut first: Option<StagedResult> = None;

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match dehaze_pipeline::dehaze_with_diagnostics(&image, &config, &StdClock) {
            Ok((staged, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            error!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                if first.is_none() {
                    first = Some(staged);
                }
                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                error!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    let Some(staged) = first else {
        return ExitCode::FAILURE;
    };

    if let Err(msg) = write_output(&staged.output, &cli.output) {
        error!("{msg}");
        return ExitCode::FAILURE;
    }
    info!(path = %cli.output.display(), "wrote dehazed image");

    if let Some(ref dir) = cli.dump_maps {
        if let Err(msg) = dump_maps(&staged, dir) {
            error!("{msg}");
            return ExitCode::FAILURE;
        }
        info!(dir = %dir.display(), "wrote intermediate maps");
    }

    ExitCode::SUCCESS
}

fn read_image(path: &Path) -> Result<RasterImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    dehaze_io::decode_image(&bytes).map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

fn write_output(image: &RasterImage, path: &Path) -> Result<(), String> {
    let is_jpeg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"));

    let result = if is_jpeg {
        dehaze_io::encode_jpeg(image)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string()))
    } else {
        image.to_rgb8().save(path).map_err(|e| e.to_string())
    };
    result.map_err(|e| format!("Error writing {}: {e}", path.display()))
}

fn dump_maps(staged: &StagedResult, dir: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Error creating {}: {e}", dir.display()))?;

    let maps = [
        ("dark_channel.png", staged.dark_channel.to_gray8()),
        ("raw_transmission.png", staged.raw_transmission.to_gray8()),
        ("estimated_transmission.png", staged.estimated_transmission.to_gray8()),
        ("refined_transmission.png", staged.refined_transmission.to_gray8()),
        ("final_transmission.png", staged.final_transmission.to_gray8()),
        ("sky_mask.png", staged.recovery_sky.to_gray8()),
    ];
    for (name, map) in maps {
        let path = dir.join(name);
        map.save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_count = all_diagnostics[0].stages().len();
    for index in 0..stage_count {
        let name = all_diagnostics[0].stages()[index].0;
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
