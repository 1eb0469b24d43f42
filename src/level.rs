//! Magnitude-to-decibel conversions
//!
//! The analyser delivers byte magnitudes (0-255). These helpers move them
//! through three ranges:
//! - dBFS, floored at -60 dB for silence
//! - a normalized 0..1 amplitude
//! - the -12..+12 "display dB" range used for thresholds and coloring

/// Maximum byte magnitude delivered by a spectrum source
pub const BYTE_MAX: f32 = 255.0;

/// dBFS floor used for zero magnitudes
pub const DB_MIN_CLAMP: f32 = -60.0;

/// Lower edge of the visual display range
pub const DISPLAY_DB_MIN: f32 = -12.0;

/// Upper edge of the visual display range
pub const DISPLAY_DB_MAX: f32 = 12.0;

/// Width of the visual display range
pub const DISPLAY_DB_RANGE: f32 = DISPLAY_DB_MAX - DISPLAY_DB_MIN;

/// Convert a byte magnitude (0-255) to dBFS, floored at -60 dB.
///
/// The result is always <= 0; a full-scale byte maps to exactly 0 dBFS.
pub fn db_from_byte(value: u8) -> f32 {
    if value == 0 {
        DB_MIN_CLAMP
    } else {
        20.0 * (value as f32 / BYTE_MAX).log10()
    }
}

/// Normalize dBFS to 0..1 over the [-60, 0] window, clamped at both ends.
pub fn norm01_from_db(db: f32) -> f32 {
    ((db - DB_MIN_CLAMP) / -DB_MIN_CLAMP).clamp(0.0, 1.0)
}

/// Rescale a normalized 0..1 amplitude into display dB (-12..+12).
///
/// Not clamped; feed it values from [`norm01_from_db`] only.
pub fn display_db(normalized: f32) -> f32 {
    DISPLAY_DB_MIN + normalized * DISPLAY_DB_RANGE
}

/// Full byte-to-display-dB composition used by the frame pipeline.
pub fn display_db_from_byte(value: u8) -> f32 {
    display_db(norm01_from_db(db_from_byte(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_from_byte_endpoints() {
        assert_eq!(db_from_byte(0), -60.0);
        assert!(db_from_byte(255).abs() < 1e-5);
    }

    #[test]
    fn test_db_from_byte_monotonic() {
        let mut prev = db_from_byte(0);
        for v in 1..=255u8 {
            let db = db_from_byte(v);
            assert!(db >= prev, "not monotonic at byte {}", v);
            prev = db;
        }
    }

    #[test]
    fn test_norm01_clamps() {
        assert_eq!(norm01_from_db(-100.0), 0.0);
        assert_eq!(norm01_from_db(50.0), 1.0);
        assert_eq!(norm01_from_db(-60.0), 0.0);
        assert_eq!(norm01_from_db(0.0), 1.0);
        assert!((norm01_from_db(-30.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_composition_fixed_points() {
        assert_eq!(display_db_from_byte(0), -12.0);
        assert!((display_db_from_byte(255) - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_composition_monotonic() {
        let mut prev = display_db_from_byte(0);
        for v in 1..=255u8 {
            let d = display_db_from_byte(v);
            assert!(d >= prev);
            prev = d;
        }
    }
}
