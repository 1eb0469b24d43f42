//! Visualizer context and frame loop
//!
//! [`Visualizer`] is the single owner of everything the pipeline reads each
//! frame: the current cell generation, the rotation/sector state, the peak
//! tracker, and the frequency boundaries. The frame loop drives it at
//! roughly 60 Hz, survives per-frame errors, and writes PNG snapshots.

use crate::bands::log_freq_bounds;
use crate::error::VizError;
use crate::geometry::{self, PolarCell, build_grid};
use crate::pipeline::{FramePlan, PeakHold, PipelineConfig, run_frame};
use crate::render;
use crate::rotation::{ROTATION_DURATION, SectorNavigator};
use crate::source::SpectrumSource;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;

/// Fraction of the canvas width used as the grid's outer radius
pub const CANVAS_RADIUS_SCALE: f32 = 0.48;

/// Grid dimensions and rendering switches
#[derive(Debug, Clone, Copy)]
pub struct VizConfig {
    pub rings: usize,
    pub sectors: usize,
    /// Square canvas edge in pixels
    pub size: u32,
    pub glow: bool,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            rings: 24,
            sectors: 24,
            size: 600,
            glow: false,
        }
    }
}

/// One self-test check outcome
#[derive(Debug)]
pub struct Diagnostic {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Owns all per-frame state: cells, rotation, peaks, and band boundaries
pub struct Visualizer {
    config: VizConfig,
    center: (f32, f32),
    radius: f32,
    cells: Vec<PolarCell>,
    navigator: SectorNavigator,
    peaks: PeakHold,
    bounds: Vec<f32>,
    sample_rate: u32,
}

impl Visualizer {
    pub fn new(config: VizConfig, sample_rate: u32) -> Result<Self, VizError> {
        let center = (config.size as f32 / 2.0, config.size as f32 / 2.0);
        let radius = config.size as f32 * CANVAS_RADIUS_SCALE;
        let navigator = SectorNavigator::new(config.sectors)?.with_duration(ROTATION_DURATION);
        let cells = build_grid(
            config.rings,
            config.sectors,
            center,
            radius,
            navigator.rotation_offset(),
        )?;
        let bounds = log_freq_bounds(sample_rate, config.sectors)?;

        Ok(Self {
            peaks: PeakHold::new(config.sectors),
            config,
            center,
            radius,
            cells,
            navigator,
            bounds,
            sample_rate,
        })
    }

    pub fn cells(&self) -> &[PolarCell] {
        &self.cells
    }

    pub fn center(&self) -> (f32, f32) {
        self.center
    }

    pub fn current_sector(&self) -> usize {
        self.navigator.current_sector()
    }

    pub fn is_rotating(&self) -> bool {
        self.navigator.is_animating()
    }

    /// Rotate to the next sector; ignored while a rotation is in flight.
    pub fn next_sector(&mut self, now: Instant) -> bool {
        self.navigator.next(now)
    }

    /// Rotate to the previous sector; ignored while a rotation is in flight.
    pub fn previous_sector(&mut self, now: Instant) -> bool {
        self.navigator.previous(now)
    }

    /// Advance rotation and run the aggregation pipeline for one frame.
    pub fn advance_frame(
        &mut self,
        now: Instant,
        source: &mut dyn SpectrumSource,
    ) -> Result<FramePlan, VizError> {
        // The source may renegotiate its rate (or FFT size) between frames.
        // New rate means new band boundaries, so held peaks are stale too.
        if source.sample_rate() != self.sample_rate {
            self.bounds = log_freq_bounds(source.sample_rate(), self.config.sectors)?;
            self.sample_rate = source.sample_rate();
            self.peaks.reset();
        }

        if self.navigator.tick(now) {
            self.cells = build_grid(
                self.config.rings,
                self.config.sectors,
                self.center,
                self.radius,
                self.navigator.rotation_offset(),
            )?;
        }

        let pipeline = PipelineConfig {
            rings: self.config.rings,
            sectors: self.config.sectors,
            radius: self.radius,
            glow: self.config.glow,
        };
        Ok(run_frame(
            &pipeline,
            source.magnitudes(),
            &self.bounds,
            self.sample_rate,
            &self.cells,
            &mut self.peaks,
        ))
    }

    /// Serialize the current cell generation as JSON.
    pub fn export_json(&self) -> Result<String, VizError> {
        Ok(geometry::export_cells(&self.cells)?)
    }

    /// Discrete pass/fail checks, reported rather than raised.
    pub fn self_test(&self) -> Vec<Diagnostic> {
        let mut results = Vec::new();

        let expected = self.config.rings * self.config.sectors;
        results.push(Diagnostic {
            name: "cell count",
            passed: self.cells.len() == expected,
            detail: format!("{} cells (expected {})", self.cells.len(), expected),
        });

        let increasing = self.bounds.windows(2).all(|pair| pair[0] < pair[1]);
        let nyquist = self.sample_rate as f32 / 2.0;
        results.push(Diagnostic {
            name: "frequency bounds",
            passed: increasing
                && self.bounds.first() == Some(&20.0)
                && self.bounds.last() == Some(&nyquist),
            detail: format!(
                "{} boundaries over 20-{} Hz",
                self.bounds.len(),
                nyquist
            ),
        });

        let low = crate::level::display_db_from_byte(0);
        let high = crate::level::display_db_from_byte(255);
        results.push(Diagnostic {
            name: "decibel fixed points",
            passed: low == -12.0 && (high - 12.0).abs() < 1e-3,
            detail: format!("byte 0 -> {:.2} dB, byte 255 -> {:.2} dB", low, high),
        });

        let roundtrip = self
            .export_json()
            .ok()
            .and_then(|json| geometry::parse_cells(&json).ok())
            .is_some_and(|parsed| parsed == self.cells);
        results.push(Diagnostic {
            name: "geometry export round-trip",
            passed: roundtrip,
            detail: format!("{} cells through JSON and back", self.cells.len()),
        });

        let renderer_ok = Pixmap::new(8, 8)
            .map(|mut pixmap| {
                let wedge = crate::geometry::Wedge {
                    inner_radius: 0.0,
                    outer_radius: 4.0,
                    start_angle: 0.0,
                    end_angle: std::f32::consts::TAU,
                };
                render::fill_wedge(&mut pixmap, (4.0, 4.0), &wedge, [255, 255, 255]);
                pixmap.pixel(4, 4).map(|px| px.alpha() > 0).unwrap_or(false)
            })
            .unwrap_or(false);
        results.push(Diagnostic {
            name: "renderer smoke fill",
            passed: renderer_ok,
            detail: "fill a wedge on an 8x8 pixmap".into(),
        });

        results
    }
}

/// Options for the live frame loop
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Total run time; `None` runs until the source goes inactive
    pub duration: Option<Duration>,
    /// Interval between PNG snapshots; `None` writes a single final frame
    pub snapshot_every: Option<Duration>,
    /// Advance to the next sector at this interval, exercising the
    /// rotation animation headlessly
    pub spin_every: Option<Duration>,
    pub out_dir: PathBuf,
}

fn snapshot_path(out_dir: &Path) -> PathBuf {
    let timestamp = jiff::Zoned::now().strftime("%Y-%m-%d_%H-%M-%S%.3f");
    out_dir.join(format!("polareq_{}.png", timestamp))
}

fn save_snapshot(pixmap: &Pixmap, out_dir: &Path) -> Result<PathBuf, VizError> {
    std::fs::create_dir_all(out_dir)?;
    let path = snapshot_path(out_dir);
    pixmap
        .save_png(&path)
        .map_err(|e| VizError::Render(e.to_string()))?;
    Ok(path)
}

/// Drive the visualizer at ~60 Hz until the duration elapses or the source
/// runs dry. Per-frame errors are logged and the loop continues; a
/// visualizer has to stay live across transient glitches.
pub fn run_loop(
    visualizer: &mut Visualizer,
    source: &mut dyn SpectrumSource,
    options: &RunOptions,
) -> Result<(), VizError> {
    let size = visualizer.config.size;
    let mut pixmap = Pixmap::new(size, size)
        .ok_or_else(|| VizError::Render(format!("cannot allocate {}x{} pixmap", size, size)))?;

    let frame_interval = Duration::from_millis(16);
    let started = Instant::now();
    let mut last_stats = started;
    let mut last_snapshot = started;
    let mut last_spin = started;
    let mut frames: u64 = 0;
    let mut last_peak_db = f32::NEG_INFINITY;

    loop {
        let now = Instant::now();

        if let Some(spin) = options.spin_every {
            if now.duration_since(last_spin) >= spin {
                // Ignored while a previous rotation is still in flight.
                if visualizer.next_sector(now) {
                    log::debug!("rotating to sector {}", visualizer.current_sector());
                }
                last_spin = now;
            }
        }

        match visualizer.advance_frame(now, source) {
            Ok(plan) => {
                if source.is_active() {
                    render::render_frame(&mut pixmap, visualizer.center(), &plan);
                } else {
                    render::render_idle_grid(&mut pixmap, visualizer.center(), visualizer.cells());
                }
                last_peak_db = plan
                    .sector_db
                    .iter()
                    .fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            }
            Err(e) => log::warn!("frame skipped: {}", e),
        }
        frames += 1;

        if now.duration_since(last_stats) >= Duration::from_secs(1) {
            log::info!(
                "frames={} sector={} max_db={:.1} held_peak={:.1} active={}",
                frames,
                visualizer.current_sector(),
                last_peak_db,
                visualizer.peaks.get(visualizer.current_sector()),
                source.is_active()
            );
            last_stats = now;
        }

        if let Some(every) = options.snapshot_every {
            if now.duration_since(last_snapshot) >= every {
                match save_snapshot(&pixmap, &options.out_dir) {
                    Ok(path) => log::info!("snapshot written to {}", path.display()),
                    Err(e) => log::warn!("snapshot failed: {}", e),
                }
                last_snapshot = now;
            }
        }

        let time_up = options
            .duration
            .map(|d| started.elapsed() >= d)
            .unwrap_or(false);
        if time_up || (options.duration.is_none() && !source.is_active()) {
            break;
        }

        std::thread::sleep(frame_interval);
    }

    // Always leave one final frame behind.
    if options.snapshot_every.is_none() {
        let path = save_snapshot(&pixmap, &options.out_dir)?;
        log::info!("final frame written to {}", path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SyntheticSource;

    fn small_config() -> VizConfig {
        VizConfig {
            rings: 4,
            sectors: 8,
            size: 100,
            glow: false,
        }
    }

    #[test]
    fn test_visualizer_construction() {
        let viz = Visualizer::new(small_config(), 44100).unwrap();
        assert_eq!(viz.cells().len(), 32);
        assert_eq!(viz.current_sector(), 0);
        assert!(!viz.is_rotating());
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = VizConfig {
            rings: 0,
            ..small_config()
        };
        assert!(Visualizer::new(config, 44100).is_err());
        assert!(Visualizer::new(small_config(), 10).is_err());
    }

    #[test]
    fn test_advance_frame_full_scale() {
        let mut viz = Visualizer::new(small_config(), 44100).unwrap();
        let mut source = SyntheticSource::constant(44100, 1024, 255).unwrap();
        let plan = viz.advance_frame(Instant::now(), &mut source).unwrap();
        assert_eq!(plan.cells.len(), 32);
        assert!(plan.cells.iter().all(|c| c.fill.is_some()));
    }

    #[test]
    fn test_bass_heavy_spectrum_fills_low_sectors_only() {
        let mut viz = Visualizer::new(small_config(), 44100).unwrap();
        let mut bytes = vec![0u8; 512];
        bytes[0] = 255;
        bytes[1] = 255;
        let mut source = SyntheticSource::with_bytes(44100, bytes);

        let plan = viz.advance_frame(Instant::now(), &mut source).unwrap();
        let filled = |sector: usize| {
            plan.cells
                .iter()
                .zip(viz.cells())
                .any(|(paint, cell)| cell.sector == sector && paint.fill.is_some())
        };
        assert!(filled(0));
        assert!(!filled(7));
    }

    #[test]
    fn test_sample_rate_change_rebuilds_bounds() {
        let mut viz = Visualizer::new(small_config(), 44100).unwrap();
        let mut source = SyntheticSource::constant(48000, 1024, 0).unwrap();
        viz.advance_frame(Instant::now(), &mut source).unwrap();
        assert_eq!(*viz.bounds.last().unwrap(), 24000.0);
    }

    #[test]
    fn test_rotation_rebuilds_cells() {
        let mut viz = Visualizer::new(small_config(), 44100).unwrap();
        let mut source = SyntheticSource::constant(44100, 1024, 0).unwrap();

        let start = Instant::now();
        let before = viz.cells()[0].start_angle;
        assert!(viz.next_sector(start));
        viz.advance_frame(start + Duration::from_millis(250), &mut source)
            .unwrap();
        assert!(viz.is_rotating());
        let during = viz.cells()[0].start_angle;
        assert_ne!(before, during);

        viz.advance_frame(start + Duration::from_millis(600), &mut source)
            .unwrap();
        assert!(!viz.is_rotating());
        // Cell identity survives rotation, only angles move.
        assert_eq!(viz.cells()[0].id, "0-0");
    }

    #[test]
    fn test_export_roundtrip_through_visualizer() {
        let viz = Visualizer::new(small_config(), 44100).unwrap();
        let json = viz.export_json().unwrap();
        let parsed = crate::geometry::parse_cells(&json).unwrap();
        assert_eq!(parsed.len(), viz.cells().len());
        assert_eq!(parsed, viz.cells());
    }

    #[test]
    fn test_self_test_passes() {
        let viz = Visualizer::new(small_config(), 44100).unwrap();
        let results = viz.self_test();
        assert_eq!(results.len(), 5);
        for diag in &results {
            assert!(diag.passed, "{} failed: {}", diag.name, diag.detail);
        }
    }
}
