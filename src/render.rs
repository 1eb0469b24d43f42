//! tiny-skia path renderer for the polar grid
//!
//! tiny-skia's `PathBuilder` has no arc primitive, so arcs are approximated
//! with cubic Bezier segments of at most a quarter turn each. A wedge is the
//! boolean difference of two circular sectors sharing an angular span: inner
//! arc forward, line out to the outer radius, outer arc backward, close.

use crate::pipeline::FramePlan;
use tiny_skia::{
    BlendMode, Color, FillRule, GradientStop, Paint, Path, PathBuilder, Pixmap, Point,
    RadialGradient, SpreadMode, Stroke, Transform,
};

/// Stroke opacity for the idle (no audio) grid
pub const GRID_LINE_OPACITY: f32 = 0.25;

/// Stroke opacity for cell outlines during the live pass
pub const CELL_STROKE_OPACITY: f32 = 0.2;

const STROKE_WIDTH: f32 = 1.0;

fn background() -> Color {
    Color::from_rgba8(18, 18, 18, 255)
}

/// Append a circular arc from `start_angle` to `end_angle` (either
/// direction) to a path under construction. The builder's current point
/// must already be at the arc's start.
fn arc_to(pb: &mut PathBuilder, center: (f32, f32), radius: f32, start_angle: f32, end_angle: f32) {
    let sweep = end_angle - start_angle;
    let segments = (sweep.abs() / std::f32::consts::FRAC_PI_2).ceil().max(1.0) as usize;
    let step = sweep / segments as f32;

    let mut a0 = start_angle;
    for _ in 0..segments {
        let a1 = a0 + step;
        // Cubic control-point distance for a circular arc segment.
        let k = 4.0 / 3.0 * (step / 4.0).tan() * radius;

        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        let p0 = (center.0 + c0 * radius, center.1 + s0 * radius);
        let p3 = (center.0 + c1 * radius, center.1 + s1 * radius);

        pb.cubic_to(
            p0.0 - s0 * k,
            p0.1 + c0 * k,
            p3.0 + s1 * k,
            p3.1 - c1 * k,
            p3.0,
            p3.1,
        );
        a0 = a1;
    }
}

/// Closed annular-sector path for one cell
pub fn wedge_path(
    center: (f32, f32),
    wedge: &crate::geometry::Wedge,
) -> Option<Path> {
    let mut pb = PathBuilder::new();
    let (sin_start, cos_start) = wedge.start_angle.sin_cos();
    let (sin_end, cos_end) = wedge.end_angle.sin_cos();

    pb.move_to(
        center.0 + cos_start * wedge.inner_radius,
        center.1 + sin_start * wedge.inner_radius,
    );
    arc_to(
        &mut pb,
        center,
        wedge.inner_radius,
        wedge.start_angle,
        wedge.end_angle,
    );
    pb.line_to(
        center.0 + cos_end * wedge.outer_radius,
        center.1 + sin_end * wedge.outer_radius,
    );
    arc_to(
        &mut pb,
        center,
        wedge.outer_radius,
        wedge.end_angle,
        wedge.start_angle,
    );
    pb.close();
    pb.finish()
}

/// Open arc path for peak markers
fn arc_path(center: (f32, f32), radius: f32, start_angle: f32, end_angle: f32) -> Option<Path> {
    let mut pb = PathBuilder::new();
    let (sin_start, cos_start) = start_angle.sin_cos();
    pb.move_to(center.0 + cos_start * radius, center.1 + sin_start * radius);
    arc_to(&mut pb, center, radius, start_angle, end_angle);
    pb.finish()
}

fn solid_paint(rgb: [u8; 3], alpha: f32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], (alpha * 255.0).round() as u8);
    paint.anti_alias = true;
    paint
}

/// Fill one wedge with an opaque color.
pub fn fill_wedge(
    pixmap: &mut Pixmap,
    center: (f32, f32),
    wedge: &crate::geometry::Wedge,
    rgb: [u8; 3],
) {
    let Some(path) = wedge_path(center, wedge) else {
        return;
    };
    pixmap.fill_path(
        &path,
        &solid_paint(rgb, 1.0),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
}

/// Stroke a wedge outline with white at the given opacity.
pub fn stroke_wedge(
    pixmap: &mut Pixmap,
    center: (f32, f32),
    wedge: &crate::geometry::Wedge,
    opacity: f32,
) {
    let Some(path) = wedge_path(center, wedge) else {
        return;
    };
    pixmap.stroke_path(
        &path,
        &solid_paint([255, 255, 255], opacity),
        &Stroke {
            width: STROKE_WIDTH,
            ..Stroke::default()
        },
        Transform::identity(),
        None,
    );
}

/// Stroke a thin white arc (peak marker).
pub fn stroke_arc(
    pixmap: &mut Pixmap,
    center: (f32, f32),
    radius: f32,
    start_angle: f32,
    end_angle: f32,
) {
    let Some(path) = arc_path(center, radius, start_angle, end_angle) else {
        return;
    };
    pixmap.stroke_path(
        &path,
        &solid_paint([255, 255, 255], 1.0),
        &Stroke {
            width: STROKE_WIDTH,
            ..Stroke::default()
        },
        Transform::identity(),
        None,
    );
}

/// Additive radial highlight centered on the grid.
pub fn draw_glow(pixmap: &mut Pixmap, center: (f32, f32), radius: f32, inner_alpha: f32) {
    let Some(inner) = Color::from_rgba(1.0, 200.0 / 255.0, 90.0 / 255.0, inner_alpha.clamp(0.0, 1.0))
    else {
        return;
    };
    let Some(shader) = RadialGradient::new(
        Point::from_xy(center.0, center.1),
        Point::from_xy(center.0, center.1),
        radius,
        vec![
            GradientStop::new(0.0, inner),
            GradientStop::new(1.0, Color::from_rgba8(0, 0, 0, 0)),
        ],
        SpreadMode::Pad,
        Transform::identity(),
    ) else {
        return;
    };
    let Some(circle) = PathBuilder::from_circle(center.0, center.1, radius) else {
        return;
    };

    let mut paint = Paint::default();
    paint.shader = shader;
    paint.anti_alias = true;
    paint.blend_mode = BlendMode::Plus;
    pixmap.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
}

/// Render a full frame plan onto the pixmap.
pub fn render_frame(pixmap: &mut Pixmap, center: (f32, f32), plan: &FramePlan) {
    pixmap.fill(background());

    for cell in &plan.cells {
        if let Some(rgb) = cell.fill {
            fill_wedge(pixmap, center, &cell.wedge, rgb);
        }
        stroke_wedge(pixmap, center, &cell.wedge, CELL_STROKE_OPACITY);
    }

    for peak in &plan.peaks {
        stroke_arc(pixmap, center, peak.radius, peak.start_angle, peak.end_angle);
    }

    if let Some(glow) = &plan.glow {
        draw_glow(pixmap, center, glow.radius, glow.inner_alpha);
    }
}

/// Render the bare grid outline used when no audio is flowing.
pub fn render_idle_grid(
    pixmap: &mut Pixmap,
    center: (f32, f32),
    cells: &[crate::geometry::PolarCell],
) {
    pixmap.fill(background());
    for cell in cells {
        stroke_wedge(pixmap, center, &cell.wedge(), GRID_LINE_OPACITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bands::log_freq_bounds;
    use crate::geometry::{DEFAULT_ROTATION, Wedge, build_grid};
    use crate::pipeline::{PeakHold, PipelineConfig, run_frame};

    #[test]
    fn test_wedge_path_builds() {
        let wedge = Wedge {
            inner_radius: 10.0,
            outer_radius: 20.0,
            start_angle: -1.0,
            end_angle: 0.5,
        };
        assert!(wedge_path((50.0, 50.0), &wedge).is_some());

        // Innermost ring collapses its inner arc to the center point.
        let core = Wedge {
            inner_radius: 0.0,
            outer_radius: 20.0,
            start_angle: 0.0,
            end_angle: 1.0,
        };
        assert!(wedge_path((50.0, 50.0), &core).is_some());
    }

    #[test]
    fn test_fill_wedge_touches_pixels() {
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        let wedge = Wedge {
            inner_radius: 0.0,
            outer_radius: 40.0,
            start_angle: 0.0,
            end_angle: std::f32::consts::TAU,
        };
        fill_wedge(&mut pixmap, (50.0, 50.0), &wedge, [255, 0, 0]);
        let px = pixmap.pixel(50, 50).unwrap();
        assert!(px.red() > 200);
        assert_eq!(px.alpha(), 255);
    }

    #[test]
    fn test_render_frame_full_scale() {
        let config = PipelineConfig {
            rings: 2,
            sectors: 4,
            radius: 45.0,
            glow: true,
        };
        let bounds = log_freq_bounds(44100, 4).unwrap();
        let cells = build_grid(2, 4, (50.0, 50.0), 45.0, DEFAULT_ROTATION).unwrap();
        let mut peaks = PeakHold::new(4);
        let plan = run_frame(&config, &[255u8; 512], &bounds, 44100, &cells, &mut peaks);

        let mut pixmap = Pixmap::new(100, 100).unwrap();
        render_frame(&mut pixmap, (50.0, 50.0), &plan);

        // A point inside ring 0 carries that ring's fill, not the background.
        let px = pixmap.pixel(50, 35).unwrap();
        assert!(px.red() > 100 || px.green() > 100);
    }

    #[test]
    fn test_idle_grid_strokes_only() {
        let cells = build_grid(4, 8, (50.0, 50.0), 45.0, DEFAULT_ROTATION).unwrap();
        let mut pixmap = Pixmap::new(100, 100).unwrap();
        render_idle_grid(&mut pixmap, (50.0, 50.0), &cells);
        // Center of a cell stays at the background color.
        let px = pixmap.pixel(50, 35).unwrap();
        assert_eq!(px.red(), 18);
    }
}
