//! Spectrum aggregation and per-frame paint planning
//!
//! One pass per rendered frame: aggregate the magnitude snapshot into
//! per-sector maxima over each sector's log-frequency band, convert to
//! display dB, decide which cells fill, update the decaying peaks, and emit
//! a renderer-agnostic [`FramePlan`].

use crate::geometry::{DEFAULT_ROTATION, PolarCell, Wedge};
use crate::level::{self, DISPLAY_DB_MIN, DISPLAY_DB_RANGE};
use std::f32::consts::TAU;

/// Peak decay per rendered frame, display-dB units (~1 dB/s at 60 fps)
pub const PEAK_DECAY_RATE: f32 = 1.0 / 60.0;

/// Share of the lowest FFT bins averaged for the bass glow
pub const BASS_BIN_PERCENT: f32 = 0.05;

const GLOW_BASE_FACTOR: f32 = 0.15;
const GLOW_BASS_MULTIPLIER: f32 = 0.2;
const GLOW_ALPHA_BASE: f32 = 0.3;
const GLOW_ALPHA_RANGE: f32 = 0.4;

/// Per-sector decaying maximum tracker
#[derive(Debug)]
pub struct PeakHold {
    peaks: Vec<f32>,
    decay: f32,
}

impl PeakHold {
    pub fn new(sectors: usize) -> Self {
        Self::with_decay(sectors, PEAK_DECAY_RATE)
    }

    pub fn with_decay(sectors: usize, decay: f32) -> Self {
        Self {
            peaks: vec![DISPLAY_DB_MIN; sectors],
            decay,
        }
    }

    /// Fold one frame's display dB into the sector's peak: the larger of
    /// the current value and the previous peak decayed by one step.
    pub fn update(&mut self, sector: usize, display_db: f32) -> f32 {
        let peak = display_db.max(self.peaks[sector] - self.decay);
        self.peaks[sector] = peak;
        peak
    }

    pub fn get(&self, sector: usize) -> f32 {
        self.peaks[sector]
    }

    /// Drop all peaks back to the display floor.
    pub fn reset(&mut self) {
        self.peaks.fill(DISPLAY_DB_MIN);
    }
}

/// Paint decision for one grid cell
#[derive(Debug, Clone)]
pub struct CellPaint {
    pub wedge: Wedge,
    /// Fill color when the sector's loudness reached this cell's threshold
    pub fill: Option<[u8; 3]>,
}

/// Thin arc marking a sector's held peak
#[derive(Debug, Clone, Copy)]
pub struct PeakArc {
    pub radius: f32,
    pub start_angle: f32,
    pub end_angle: f32,
}

/// Soft radial highlight driven by bass energy
#[derive(Debug, Clone, Copy)]
pub struct Glow {
    pub radius: f32,
    pub inner_alpha: f32,
}

/// Everything the renderer needs for one frame
#[derive(Debug)]
pub struct FramePlan {
    pub cells: Vec<CellPaint>,
    pub peaks: Vec<PeakArc>,
    pub glow: Option<Glow>,
    /// Per-sector display dB of this frame, kept for stats and inspection
    pub sector_db: Vec<f32>,
}

/// Maximum raw byte per sector over that sector's frequency band.
///
/// Band `[bounds[s], bounds[s+1]]` maps to the inclusive bin range
/// `floor(f / nyquist * bins)`; bins past the end of the buffer read as 0,
/// which also covers the buffer shrinking after an FFT-size change.
pub fn sector_maxima(magnitudes: &[u8], bounds: &[f32], sample_rate: u32) -> Vec<u8> {
    let sectors = bounds.len().saturating_sub(1);
    let nyquist = sample_rate as f32 / 2.0;
    let bins = magnitudes.len();

    let mut maxima = vec![0u8; sectors];
    for (sector, max) in maxima.iter_mut().enumerate() {
        let bin_a = ((bounds[sector] / nyquist) * bins as f32).floor() as usize;
        let bin_b = ((bounds[sector + 1] / nyquist) * bins as f32).floor() as usize;
        for bin in bin_a..=bin_b {
            let value = magnitudes.get(bin).copied().unwrap_or(0);
            if value > *max {
                *max = value;
            }
        }
    }
    maxima
}

/// Mean of the lowest ~5% of bins, normalized to 0..1.
pub fn bass_level(magnitudes: &[u8]) -> f32 {
    if magnitudes.is_empty() {
        return 0.0;
    }
    let bass_bins = ((magnitudes.len() as f32 * BASS_BIN_PERCENT).floor() as usize).max(1);
    let sum: u32 = magnitudes[..bass_bins.min(magnitudes.len())]
        .iter()
        .map(|&v| v as u32)
        .sum();
    sum as f32 / (bass_bins as f32 * level::BYTE_MAX)
}

/// Map display dB onto the green-to-red loudness ramp.
///
/// Input is clamped to [-12, +12]; hue runs 120deg (green) down to 0 (red)
/// while lightness rises from 40% to 80%.
pub fn color_for_db(db: f32) -> [u8; 3] {
    let t = (db.clamp(DISPLAY_DB_MIN, level::DISPLAY_DB_MAX) - DISPLAY_DB_MIN) / DISPLAY_DB_RANGE;
    let hue = 120.0 * (1.0 - t);
    let lightness = (40.0 + 40.0 * t) / 100.0;
    hsl_to_rgb(hue, 1.0, lightness)
}

/// Standard HSL to sRGB conversion (saturation and lightness in 0..1).
fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [u8; 3] {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    [
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ]
}

/// Parameters the pipeline needs beyond the per-frame inputs
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub rings: usize,
    pub sectors: usize,
    pub radius: f32,
    pub glow: bool,
}

/// Run one frame of the pipeline.
///
/// `cells` is the current grid generation; `bounds` the sector frequency
/// boundaries; `magnitudes` the latest snapshot (possibly stale or zeroed).
pub fn run_frame(
    config: &PipelineConfig,
    magnitudes: &[u8],
    bounds: &[f32],
    sample_rate: u32,
    cells: &[PolarCell],
    peaks: &mut PeakHold,
) -> FramePlan {
    let maxima = sector_maxima(magnitudes, bounds, sample_rate);

    let sector_db: Vec<f32> = maxima
        .iter()
        .map(|&byte| level::display_db_from_byte(byte))
        .collect();

    // Fill pass: inner rings light up before outer ones.
    let cell_paints = cells
        .iter()
        .map(|cell| {
            let threshold =
                DISPLAY_DB_MIN + ((cell.ring + 1) as f32 / config.rings as f32) * DISPLAY_DB_RANGE;
            let fill = (sector_db[cell.sector] >= threshold).then(|| color_for_db(threshold));
            CellPaint {
                wedge: cell.wedge(),
                fill,
            }
        })
        .collect();

    // Peak pass: one decay step per sector per frame, drawn in the home
    // rotation frame independent of any in-flight rotation.
    let ring_step = config.radius / config.rings as f32;
    let sector_step = TAU / config.sectors as f32;
    let peak_arcs = (0..config.sectors)
        .map(|sector| {
            let peak = peaks.update(sector, sector_db[sector]);
            let ring_index =
                (((peak - DISPLAY_DB_MIN) / DISPLAY_DB_RANGE) * config.rings as f32).floor();
            PeakArc {
                radius: (ring_index + 1.0) * ring_step,
                start_angle: sector as f32 * sector_step + DEFAULT_ROTATION,
                end_angle: (sector + 1) as f32 * sector_step + DEFAULT_ROTATION,
            }
        })
        .collect();

    let glow = config.glow.then(|| {
        let bass = bass_level(magnitudes);
        Glow {
            radius: config.radius * (GLOW_BASE_FACTOR + bass * GLOW_BASS_MULTIPLIER),
            inner_alpha: GLOW_ALPHA_BASE + bass * GLOW_ALPHA_RANGE,
        }
    });

    FramePlan {
        cells: cell_paints,
        peaks: peak_arcs,
        glow,
        sector_db,
    }
}
