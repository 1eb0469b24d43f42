//! Polar grid geometry
//!
//! A grid of `rings x sectors` annular tiles. Sector 0 starts at the
//! rotation offset (default -PI/2, centered "up"); ring 0 is innermost.
//! Cells are immutable value objects: the whole set is rebuilt whenever the
//! dimensions, radius, or rotation change.

use crate::error::VizError;
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, TAU};

/// Default rotation offset placing sector 0 at the top of the grid
pub const DEFAULT_ROTATION: f32 = -FRAC_PI_2;

/// One ring-sector tile of the polar grid
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PolarCell {
    /// Stable `"{ring}-{sector}"` key, invariant across rotation
    pub id: String,
    pub ring: usize,
    pub sector: usize,
    /// Inner radius in pixels
    pub inner_ring: f32,
    /// Outer radius in pixels
    pub outer_ring: f32,
    /// Start angle in radians, in the current rotation frame
    pub start_angle: f32,
    /// End angle in radians (`start_angle + 2PI/sectors`)
    pub end_angle: f32,
    /// Cartesian midpoint of the wedge (mid-radius, mid-angle)
    pub center_x: f32,
    pub center_y: f32,
}

impl PolarCell {
    /// Wedge description consumed by the path renderer
    pub fn wedge(&self) -> Wedge {
        Wedge {
            inner_radius: self.inner_ring,
            outer_radius: self.outer_ring,
            start_angle: self.start_angle,
            end_angle: self.end_angle,
        }
    }
}

/// An annular sector: the area between two arcs sharing an angular span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wedge {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub start_angle: f32,
    pub end_angle: f32,
}

/// Build the full cell set for a `rings x sectors` grid.
///
/// Ring step is `radius / rings`, sector step `2PI / sectors`. Returns
/// exactly `rings * sectors` cells ordered ring-major. Zero rings/sectors or
/// a non-positive radius are precondition failures, not empty grids.
pub fn build_grid(
    rings: usize,
    sectors: usize,
    center: (f32, f32),
    radius: f32,
    rotation_offset: f32,
) -> Result<Vec<PolarCell>, VizError> {
    if rings == 0 || sectors == 0 {
        return Err(VizError::InvalidGrid { rings, sectors });
    }
    if !(radius > 0.0) {
        return Err(VizError::InvalidRadius(radius));
    }

    let ring_step = radius / rings as f32;
    let sector_step = TAU / sectors as f32;

    let mut cells = Vec::with_capacity(rings * sectors);
    for ring in 0..rings {
        let inner_ring = ring as f32 * ring_step;
        let outer_ring = (ring + 1) as f32 * ring_step;

        for sector in 0..sectors {
            let start_angle = sector as f32 * sector_step + rotation_offset;
            let end_angle = (sector + 1) as f32 * sector_step + rotation_offset;
            let mid_ring = (inner_ring + outer_ring) / 2.0;
            let mid_angle = (start_angle + end_angle) / 2.0;

            cells.push(PolarCell {
                id: format!("{}-{}", ring, sector),
                ring,
                sector,
                inner_ring,
                outer_ring,
                start_angle,
                end_angle,
                center_x: center.0 + mid_angle.cos() * mid_ring,
                center_y: center.1 + mid_angle.sin() * mid_ring,
            });
        }
    }

    Ok(cells)
}

/// Serialize the cell set as pretty-printed JSON for offline inspection.
pub fn export_cells(cells: &[PolarCell]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(cells)
}

/// Parse a previously exported cell set.
pub fn parse_cells(json: &str) -> Result<Vec<PolarCell>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_shape() {
        let cells = build_grid(24, 24, (300.0, 300.0), 288.0, DEFAULT_ROTATION).unwrap();
        assert_eq!(cells.len(), 24 * 24);

        let sector_step = TAU / 24.0;
        let mut seen = std::collections::HashSet::new();
        for cell in &cells {
            assert!(seen.insert((cell.ring, cell.sector)), "duplicate cell");
            assert!(cell.inner_ring < cell.outer_ring);
            assert!((cell.end_angle - cell.start_angle - sector_step).abs() < 1e-4);
            assert_eq!(cell.id, format!("{}-{}", cell.ring, cell.sector));
        }
    }

    #[test]
    fn test_ring_zero_starts_at_center() {
        let cells = build_grid(4, 8, (0.0, 0.0), 100.0, DEFAULT_ROTATION).unwrap();
        let inner = cells.iter().find(|c| c.ring == 0).unwrap();
        assert_eq!(inner.inner_ring, 0.0);
        assert_eq!(inner.outer_ring, 25.0);
        let outer = cells.iter().find(|c| c.ring == 3).unwrap();
        assert!((outer.outer_ring - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_default_rotation_centers_sector_zero_up() {
        // With the -PI/2 offset, sector 0's midpoint sits above the center.
        let cells = build_grid(1, 4, (100.0, 100.0), 50.0, DEFAULT_ROTATION).unwrap();
        let first = &cells[0];
        assert!(first.center_y < 100.0);
    }

    #[test]
    fn test_rejects_degenerate_grids() {
        assert!(matches!(
            build_grid(0, 24, (0.0, 0.0), 100.0, 0.0),
            Err(VizError::InvalidGrid { rings: 0, .. })
        ));
        assert!(build_grid(24, 0, (0.0, 0.0), 100.0, 0.0).is_err());
        assert!(build_grid(4, 4, (0.0, 0.0), 0.0, 0.0).is_err());
        assert!(build_grid(4, 4, (0.0, 0.0), -5.0, 0.0).is_err());
    }

    #[test]
    fn test_export_roundtrip() {
        let cells = build_grid(3, 5, (120.0, 120.0), 110.0, DEFAULT_ROTATION).unwrap();
        let json = export_cells(&cells).unwrap();
        let parsed = parse_cells(&json).unwrap();
        assert_eq!(cells, parsed);
    }

    #[test]
    fn test_export_field_names() {
        let cells = build_grid(1, 1, (0.0, 0.0), 10.0, DEFAULT_ROTATION).unwrap();
        let json = export_cells(&cells).unwrap();
        for field in [
            "\"id\"",
            "\"ring\"",
            "\"sector\"",
            "\"innerRing\"",
            "\"outerRing\"",
            "\"startAngle\"",
            "\"endAngle\"",
            "\"centerX\"",
            "\"centerY\"",
        ] {
            assert!(json.contains(field), "missing {} in export", field);
        }
    }
}
