mod app;
mod bands;
mod error;
mod geometry;
mod level;
mod pipeline;
mod render;
mod rotation;
mod source;

use crate::app::{RunOptions, Visualizer, VizConfig, run_loop};
use crate::geometry::{DEFAULT_ROTATION, build_grid, export_cells};
use crate::source::{
    DEFAULT_FFT_SIZE, MicSource, SpectrumSource, SyntheticSource, WavSource, nearest_fft_size,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "polareq")]
#[command(about = "Radial spectrum visualizer rendering audio onto a polar grid")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the visualizer against live or file audio
    Run {
        /// Number of concentric rings
        #[arg(long, default_value = "24")]
        rings: usize,

        /// Number of angular sectors
        #[arg(long, default_value = "24")]
        sectors: usize,

        /// FFT size (power of two, 32..=2048)
        #[arg(long, default_value = "2048")]
        fft_size: usize,

        /// Square canvas edge in pixels
        #[arg(long, default_value = "600")]
        size: u32,

        /// Enable the bass-reactive center glow
        #[arg(long)]
        glow: bool,

        /// Run time in seconds (0 = until the source ends)
        #[arg(long, default_value = "10")]
        duration: u64,

        /// Seconds between PNG snapshots (0 = single final frame)
        #[arg(long, default_value = "0")]
        snapshot_every: u64,

        /// Directory for PNG snapshots
        #[arg(long, default_value = "frames")]
        out_dir: PathBuf,

        /// Read audio from a WAV file instead of the microphone
        #[arg(long)]
        input: Option<PathBuf>,

        /// Rotate to the next sector every N seconds (0 = never)
        #[arg(long, default_value = "0")]
        spin_every: u64,
    },

    /// Write the cell geometry as JSON
    Export {
        #[arg(long, default_value = "24")]
        rings: usize,

        #[arg(long, default_value = "24")]
        sectors: usize,

        /// Square canvas edge in pixels
        #[arg(long, default_value = "600")]
        size: u32,

        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Run built-in diagnostics against a synthetic signal
    SelfTest,

    /// List available audio input devices
    Devices,
}

fn export_geometry(rings: usize, sectors: usize, size: u32, output: Option<PathBuf>) -> Result<()> {
    let center = (size as f32 / 2.0, size as f32 / 2.0);
    let radius = size as f32 * app::CANVAS_RADIUS_SCALE;
    let cells = build_grid(rings, sectors, center, radius, DEFAULT_ROTATION)?;
    let json = export_cells(&cells)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {} cells to {}", cells.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            rings,
            sectors,
            fft_size,
            size,
            glow,
            duration,
            snapshot_every,
            out_dir,
            input,
            spin_every,
        } => {
            let fft_size = {
                let snapped = nearest_fft_size(fft_size);
                if snapped != fft_size {
                    log::warn!("fft size {} is not valid, using {}", fft_size, snapped);
                }
                snapped
            };

            let mut source: Box<dyn SpectrumSource> = match &input {
                Some(path) => match WavSource::new(path, fft_size) {
                    Ok(source) => Box::new(source),
                    Err(e) => {
                        eprintln!("Failed to open {}: {}", path.display(), e);
                        std::process::exit(1);
                    }
                },
                None => match MicSource::new(fft_size) {
                    Ok(source) => Box::new(source),
                    Err(e) => {
                        eprintln!("Failed to open input device: {}", e);
                        eprintln!("Tip: use --input <file.wav> to run without a microphone");
                        std::process::exit(1);
                    }
                },
            };

            let config = VizConfig {
                rings,
                sectors,
                size,
                glow,
            };
            let mut visualizer = match Visualizer::new(config, source.sample_rate()) {
                Ok(visualizer) => visualizer,
                Err(e) => {
                    eprintln!("Failed to build visualizer: {}", e);
                    std::process::exit(1);
                }
            };

            let options = RunOptions {
                duration: (duration > 0).then(|| Duration::from_secs(duration)),
                snapshot_every: (snapshot_every > 0).then(|| Duration::from_secs(snapshot_every)),
                spin_every: (spin_every > 0).then(|| Duration::from_secs(spin_every)),
                out_dir,
            };

            log::info!(
                "starting: {}x{} grid, {} px canvas, fft={}",
                rings,
                sectors,
                size,
                fft_size
            );
            if let Err(e) = run_loop(&mut visualizer, source.as_mut(), &options) {
                eprintln!("Visualizer error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Export {
            rings,
            sectors,
            size,
            output,
        } => {
            if let Err(e) = export_geometry(rings, sectors, size, output) {
                eprintln!("Export failed: {}", e);
                std::process::exit(1);
            }
        }

        Commands::SelfTest => {
            let config = VizConfig::default();
            let mut visualizer = match Visualizer::new(config, 44100) {
                Ok(visualizer) => visualizer,
                Err(e) => {
                    eprintln!("Failed to build visualizer: {}", e);
                    std::process::exit(1);
                }
            };

            let mut failures = 0;
            for diag in visualizer.self_test() {
                let status = if diag.passed { "PASS" } else { "FAIL" };
                println!("{:<8} {:<24} {}", status, diag.name, diag.detail);
                if !diag.passed {
                    failures += 1;
                }
            }

            // One end-to-end frame against a known full-scale signal.
            let frame_ok = SyntheticSource::constant(44100, DEFAULT_FFT_SIZE, 255)
                .map_err(|e| e.to_string())
                .and_then(|mut source| {
                    visualizer
                        .advance_frame(std::time::Instant::now(), &mut source)
                        .map_err(|e| e.to_string())
                })
                .map(|plan| plan.cells.iter().all(|c| c.fill.is_some()));
            match frame_ok {
                Ok(true) => println!(
                    "{:<8} {:<24} full-scale signal fills every cell",
                    "PASS", "pipeline frame"
                ),
                Ok(false) => {
                    println!(
                        "{:<8} {:<24} full-scale signal left cells unfilled",
                        "FAIL", "pipeline frame"
                    );
                    failures += 1;
                }
                Err(e) => {
                    println!("{:<8} {:<24} {}", "FAIL", "pipeline frame", e);
                    failures += 1;
                }
            }

            if failures > 0 {
                eprintln!("{} check(s) failed", failures);
                std::process::exit(1);
            }
        }

        Commands::Devices => match MicSource::list_devices() {
            Ok(devices) => {
                println!("Available Audio Devices:");
                println!(
                    "{:<30} {:<10} {:<14} Channels",
                    "Name", "Default", "Sample Rate"
                );
                println!("{}", "-".repeat(66));
                for device in devices {
                    let default_str = if device.is_default { "YES" } else { "NO" };
                    println!(
                        "{:<30} {:<10} {:<14} {}",
                        &device.name[..device.name.len().min(30)],
                        default_str,
                        device.default_sample_rate,
                        device.channels
                    );
                }
            }
            Err(e) => {
                eprintln!("Failed to list audio devices: {}", e);
                std::process::exit(1);
            }
        },
    }
}
