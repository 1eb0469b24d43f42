//! Logarithmic frequency banding
//!
//! Each angular sector owns one frequency band. Boundaries run from 20 Hz up
//! to Nyquist on a log10 scale, so the low end gets the same angular
//! resolution the ear gives it.

use crate::error::VizError;

/// Lowest frequency covered by the grid
pub const FREQ_MIN_HZ: f32 = 20.0;

/// Compute `sectors + 1` logarithmically spaced boundaries from 20 Hz to
/// Nyquist (`sample_rate / 2`).
///
/// Boundary `i` and `i + 1` delimit the band owned by sector `i`. The first
/// value is exactly 20 Hz and the last exactly Nyquist. Sample rates at or
/// below 40 Hz would put Nyquist under 20 Hz and are rejected.
pub fn log_freq_bounds(sample_rate: u32, sectors: usize) -> Result<Vec<f32>, VizError> {
    if sectors == 0 {
        return Err(VizError::InvalidGrid { rings: 1, sectors });
    }
    let nyquist = sample_rate as f32 / 2.0;
    if nyquist <= FREQ_MIN_HZ {
        return Err(VizError::InvalidSampleRate(sample_rate));
    }

    let log_min = FREQ_MIN_HZ.log10();
    let log_max = nyquist.log10();

    let mut bounds = Vec::with_capacity(sectors + 1);
    for i in 0..=sectors {
        let t = i as f32 / sectors as f32;
        bounds.push(10f32.powf(log_min + t * (log_max - log_min)));
    }

    // Pin the endpoints so float error cannot shift them off 20 Hz / Nyquist.
    bounds[0] = FREQ_MIN_HZ;
    bounds[sectors] = nyquist;

    Ok(bounds)
}
