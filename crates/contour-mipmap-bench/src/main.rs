//! contour-mipmap-bench: CLI tool for contour parameter experimentation
//! and diagnostics.
//!
//! Builds a synthetic raster, constructs its mipmap pyramid once, and
//! contours it at one or many thresholds with configurable options,
//! printing per-stage diagnostics. Useful for:
//!
//! - Measuring walk and stitch cost against raster size
//! - Tuning smoothing kernel width and cycle count
//! - Seeing how `--max-level` trades detail for speed
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin contour-mipmap-bench -- [OPTIONS]
//! ```
//!
//! Log output goes to stderr and is controlled by `RUST_LOG` (falling
//! back to `--log-level`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::f64::consts::PI;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use contour_mipmap::diagnostics::ContourDiagnostics;
use contour_mipmap::{Clock, ContourMipmap, ContourOptions, IsolineSet};
use tracing_subscriber::EnvFilter;

/// Contour parameter experimentation and diagnostics.
///
/// Contours a synthetic raster and prints detailed per-stage timing and
/// count diagnostics.
#[derive(Parser)]
#[command(name = "contour-mipmap-bench", version)]
struct Cli {
    /// Synthetic surface to contour.
    #[arg(long, value_enum, default_value_t = Surface::Waves)]
    surface: Surface,

    /// Raster width in pixels.
    #[arg(long, default_value_t = 512, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    width: u32,

    /// Raster height in pixels.
    #[arg(long, default_value_t = 512, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    height: u32,

    /// Blank out a horizontal band of rows (10% of the height) as no-data.
    #[arg(long)]
    nan_band: bool,

    /// Contour a single threshold.
    #[arg(long, conflicts_with = "interval")]
    level: Option<f64>,

    /// Contour every multiple of this step within the raster's range.
    #[arg(long, default_value_t = 0.1)]
    interval: f64,

    /// Deepest pyramid level to descend to (default: full depth).
    #[arg(long)]
    max_level: Option<usize>,

    /// Box filter half-width.
    #[arg(long, default_value_t = ContourOptions::DEFAULT_SMOOTH_KERNEL_WIDTH)]
    smooth_kernel_width: usize,

    /// Number of smoothing passes.
    #[arg(long, default_value_t = ContourOptions::DEFAULT_SMOOTH_CYCLES)]
    smooth_cycles: usize,

    /// Minimum points per line.
    #[arg(long, default_value_t = ContourOptions::DEFAULT_MIN_POINTS)]
    min_points: usize,

    /// RDP simplification tolerance in pixels (0 disables).
    #[arg(long, default_value_t = ContourOptions::DEFAULT_SIMPLIFY_TOLERANCE)]
    simplify_tolerance: f64,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Print the contour lines of the first run as JSON.
    #[arg(long)]
    lines: bool,

    /// Full contour options as a JSON string.
    ///
    /// When provided, all other option flags are ignored. Missing fields
    /// take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Synthetic raster selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Surface {
    /// Single Gaussian bump in the center.
    Peak,
    /// Two bumps on the diagonal, joined by a saddle.
    TwinPeaks,
    /// Diagonal ridge running corner to corner.
    Ridge,
    /// Product of sine waves: many rings and edge-crossing lines.
    Waves,
}

impl Surface {
    /// Sample at normalized coordinates `u, v` in `[0, 1)`.
    fn sample(self, u: f64, v: f64) -> f64 {
        let bump = |cx: f64, cy: f64, k: f64| (-(u - cx).hypot(v - cy).powi(2) * k).exp();
        match self {
            Self::Peak => bump(0.5, 0.5, 20.0),
            Self::TwinPeaks => bump(0.3, 0.3, 40.0).max(bump(0.7, 0.7, 40.0)),
            Self::Ridge => (-(u - v).powi(2) * 30.0).exp(),
            Self::Waves => (u * 4.0 * PI).sin() * (v * 3.0 * PI).cos(),
        }
    }
}

/// Row-major samples for the selected surface.
fn build_raster(cli: &Cli) -> Vec<f64> {
    let (w, h) = (f64::from(cli.width), f64::from(cli.height));
    let band = (h * 0.45)..(h * 0.55);
    (0..cli.height)
        .flat_map(|y| (0..cli.width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (px, py) = (f64::from(x) + 0.5, f64::from(y) + 0.5);
            if cli.nan_band && band.contains(&py) {
                f64::NAN
            } else {
                cli.surface.sample(px / w, py / h)
            }
        })
        .collect()
}

/// Build [`ContourOptions`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual option flags are ignored.
fn options_from_cli(cli: &Cli) -> Result<ContourOptions, String> {
    let options = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        ContourOptions {
            max_level: cli.max_level,
            smooth_kernel_width: cli.smooth_kernel_width,
            smooth_cycles: cli.smooth_cycles,
            min_points: cli.min_points,
            simplify_tolerance: cli.simplify_tolerance,
        }
    };
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    let options = match options_from_cli(&cli) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let raster = build_raster(&cli);
    let build_start = Instant::now();
    let mipmap = match ContourMipmap::new(&raster, cli.width, cli.height) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error building pyramid: {e}");
            return ExitCode::FAILURE;
        }
    };
    let build_ms = build_start.elapsed().as_secs_f64() * 1000.0;
    tracing::info!(
        width = cli.width,
        height = cli.height,
        depth = mipmap.depth(),
        build_ms,
        "pyramid ready"
    );

    let thresholds = match cli.level {
        Some(level) => vec![level],
        None => match mipmap.intervals(cli.interval) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        },
    };

    eprintln!(
        "Surface: {:?} {}x{}{} ({} levels, built in {build_ms:.3}ms)",
        cli.surface,
        cli.width,
        cli.height,
        if cli.nan_band { " with no-data band" } else { "" },
        mipmap.depth(),
    );
    eprintln!("Options: {options:#?}");
    eprintln!("Thresholds: {}", thresholds.len());
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_runs: Vec<Vec<ContourDiagnostics>> = Vec::with_capacity(cli.runs);
    let mut isolines: Vec<IsolineSet> = Vec::new();

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut run_diagnostics = Vec::with_capacity(thresholds.len());
        for &threshold in &thresholds {
            match mipmap.contour_with_diagnostics(threshold, &options, &StdClock) {
                Ok((lines, diagnostics)) => {
                    if cli.json {
                        match serde_json::to_string_pretty(&diagnostics) {
                            Ok(json) => println!("{json}"),
                            Err(e) => {
                                eprintln!("Error serializing diagnostics: {e}");
                                return ExitCode::FAILURE;
                            }
                        }
                    } else if !cli.lines {
                        println!("{}\n", diagnostics.report());
                    }
                    if run == 0 && cli.lines {
                        isolines.push(IsolineSet { threshold, lines });
                    }
                    run_diagnostics.push(diagnostics);
                }
                Err(e) => {
                    eprintln!("Contour error at {threshold}: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        all_runs.push(run_diagnostics);
    }

    if cli.lines {
        match serde_json::to_string(&isolines) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing lines: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_runs);
    }

    ExitCode::SUCCESS
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

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&ContourDiagnostics) -> Option<Duration>;

/// Sum of one stage's durations over a run, in milliseconds.
fn run_ms(run: &[ContourDiagnostics], extractor: StageExtractor) -> f64 {
    run.iter()
        .filter_map(extractor)
        .map(|d| d.as_secs_f64() * 1000.0)
        .sum()
}

/// Print aggregated statistics across multiple runs.
///
/// Each run covers every threshold; stage means are per run.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_runs: &[Vec<ContourDiagnostics>]) {
    println!();
    println!("Summary ({} runs)\n{}", all_runs.len(), "=".repeat(60));

    if all_runs.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let totals: Vec<f64> = all_runs
        .iter()
        .map(|run| run_ms(run, |d| Some(d.total_duration)))
        .collect();
    let min = totals.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = totals.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = totals.iter().sum::<f64>() / totals.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Walk", |d| Some(d.walk.duration)),
        ("Stitch", |d| Some(d.stitch.duration)),
        ("Filter", |d| Some(d.filter.duration)),
        ("Smooth", |d| Some(d.smooth.duration)),
        ("Simplify", |d| d.simplify.as_ref().map(|s| s.duration)),
    ];

    for (name, extractor) in stage_extractors {
        if all_runs.iter().flatten().all(|d| extractor(d).is_none()) {
            continue;
        }
        let stage_mean =
            all_runs.iter().map(|run| run_ms(run, *extractor)).sum::<f64>() / all_runs.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}
