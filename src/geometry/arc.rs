//! Multi-quadrant arc tessellation for G02/G03 draws.
//!
//! Arcs are sampled into chord segments on the centerline, and each chord is
//! widened by the stroke module.

use std::f64::consts::TAU;

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::types::{Aperture, Point};

use super::stroke::{draw_linear, resolve_stroke_width};

/// Maximum chord length in millimetres. Design-time constant: keeps arc
/// error below a display pixel at 100x zoom of a 50 mm board.
pub const MAX_CHORD_LENGTH: f64 = 0.02;

const MIN_ARC_SEGMENTS: u32 = 8;
const POINT_EQUALITY_EPSILON: f64 = 1e-9;

/// Arc sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// G02.
    Clockwise,
    /// G03.
    CounterClockwise,
}

/// Widen a circular interpolation from `from` to `to` whose centre lies at
/// `from + center_offset`. Multi-quadrant semantics only; the interpreter
/// downgrades G74 before calling in here.
pub fn draw_arc(
    builder: &mut MeshBuilder,
    from: Point,
    to: Point,
    center_offset: Point,
    direction: ArcDirection,
    aperture: &Aperture,
) -> Result<(), GeometryError> {
    if resolve_stroke_width(builder, aperture)?.is_none() {
        return Ok(());
    }

    let Some(points) = centerline(builder, from, to, center_offset, direction) else {
        return Ok(());
    };

    // Dimensions validated above; strip the sign so per-chord widening does
    // not repeat the warnings.
    let aperture = cleaned(aperture);
    let mut previous: Option<Point> = None;
    for point in points {
        if let Some(previous) = previous {
            draw_linear(builder, previous, point, &aperture)?;
        }
        previous = Some(point);
    }

    Ok(())
}

/// Sample the arc centerline into chord endpoints.
///
/// Returns `None` (with a warning) for degenerate arcs: zero radius, or
/// coincident endpoints with a zero centre offset.
pub(crate) fn centerline(
    builder: &mut MeshBuilder,
    from: Point,
    to: Point,
    center_offset: Point,
    direction: ArcDirection,
) -> Option<Vec<Point>> {
    let center = Point::new(from.x + center_offset.x, from.y + center_offset.y);

    let radius_start = distance(from, center);
    if radius_start <= f64::EPSILON {
        builder.warn("arc has zero radius; skipping".to_string());
        return None;
    }

    let start_angle = (from.y - center.y).atan2(from.x - center.x);
    let (radius, sweep) = if points_approx_equal(from, to) {
        if center_offset.x.abs() <= POINT_EQUALITY_EPSILON
            && center_offset.y.abs() <= POINT_EQUALITY_EPSILON
        {
            builder.warn("arc start equals end with zero centre offset; skipping".to_string());
            return None;
        }
        let sweep = match direction {
            ArcDirection::Clockwise => -TAU,
            ArcDirection::CounterClockwise => TAU,
        };
        (radius_start, sweep)
    } else {
        let radius_end = distance(to, center);
        let tolerance = (0.001 * radius_start).max(1e-6);
        let radius = if (radius_start - radius_end).abs() > tolerance {
            builder.warn(format!(
                "arc radii mismatch ({radius_start} vs {radius_end}); using average"
            ));
            (radius_start + radius_end) / 2.0
        } else {
            radius_start
        };
        let end_angle = (to.y - center.y).atan2(to.x - center.x);
        (radius, compute_sweep(start_angle, end_angle, direction))
    };

    let arc_length = sweep.abs() * radius;
    let segments = segment_count(arc_length);

    let mut points = Vec::with_capacity(segments as usize + 1);
    for step in 0..=segments {
        let t = f64::from(step) / f64::from(segments);
        let angle = sweep.mul_add(t, start_angle);
        points.push(Point::new(
            radius.mul_add(angle.cos(), center.x),
            radius.mul_add(angle.sin(), center.y),
        ));
    }
    Some(points)
}

/// Signed sweep: non-positive for clockwise, non-negative for
/// counter-clockwise, adjusted by a full turn when the raw delta disagrees.
fn compute_sweep(start_angle: f64, end_angle: f64, direction: ArcDirection) -> f64 {
    let delta = end_angle - start_angle;
    match direction {
        ArcDirection::Clockwise => {
            if delta >= 0.0 {
                delta - TAU
            } else {
                delta
            }
        }
        ArcDirection::CounterClockwise => {
            if delta <= 0.0 {
                delta + TAU
            } else {
                delta
            }
        }
    }
}

fn segment_count(arc_length: f64) -> u32 {
    let raw = (arc_length / MAX_CHORD_LENGTH).ceil();
    if !raw.is_finite() || raw <= 0.0 {
        return MIN_ARC_SEGMENTS;
    }
    (raw as u32).max(MIN_ARC_SEGMENTS)
}

fn distance(a: Point, b: Point) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx.hypot(dy)
}

fn points_approx_equal(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= POINT_EQUALITY_EPSILON && (a.y - b.y).abs() <= POINT_EQUALITY_EPSILON
}

fn cleaned(aperture: &Aperture) -> Aperture {
    match aperture {
        Aperture::Circle { diameter } => Aperture::Circle {
            diameter: diameter.abs(),
        },
        Aperture::Rectangle { width, height } => Aperture::Rectangle {
            width: width.abs(),
            height: height.abs(),
        },
        Aperture::Obround { width, height } => Aperture::Obround {
            width: width.abs(),
            height: height.abs(),
        },
        Aperture::Polygon {
            diameter,
            vertices,
            rotation,
        } => Aperture::Polygon {
            diameter: diameter.abs(),
            vertices: *vertices,
            rotation: *rotation,
        },
        Aperture::Macro { name, params } => Aperture::Macro {
            name: name.clone(),
            params: params.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn quarter_arc_points_stay_on_radius() {
        let mut builder = MeshBuilder::new();
        let points = centerline(
            &mut builder,
            Point::new(0.0, 5.0),
            Point::new(5.0, 0.0),
            Point::new(0.0, -5.0),
            ArcDirection::Clockwise,
        )
        .expect("arc should tessellate");
        assert!(!points.is_empty());
        for point in points {
            let radius = distance(point, Point::new(0.0, 0.0));
            assert!((radius - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sweep_signs_match_direction() {
        let cw = compute_sweep(0.0, PI / 2.0, ArcDirection::Clockwise);
        let ccw = compute_sweep(0.0, PI / 2.0, ArcDirection::CounterClockwise);
        assert!(cw < 0.0);
        assert!(ccw > 0.0);
    }

    #[test]
    fn chord_rule_caps_segment_length() {
        // Quarter circle of radius 5: length ~7.85 mm, 0.02 mm chords.
        let mut builder = MeshBuilder::new();
        let points = centerline(
            &mut builder,
            Point::new(5.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(-5.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .expect("arc should tessellate");
        let expected = ((PI / 2.0) * 5.0 / MAX_CHORD_LENGTH).ceil() as usize;
        assert_eq!(points.len(), expected + 1);
    }

    #[test]
    fn tiny_arc_uses_minimum_segment_count() {
        let angle = 0.01_f64.to_radians();
        let mut builder = MeshBuilder::new();
        let points = centerline(
            &mut builder,
            Point::new(1.0, 0.0),
            Point::new(angle.cos(), angle.sin()),
            Point::new(-1.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .expect("arc should tessellate");
        assert_eq!(points.len(), MIN_ARC_SEGMENTS as usize + 1);
    }

    #[test]
    fn full_circle_when_endpoints_coincide() {
        let mut builder = MeshBuilder::new();
        let points = centerline(
            &mut builder,
            Point::new(5.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(-5.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .expect("full circle should tessellate");
        let (mut min_x, mut max_x, mut min_y, mut max_y) =
            (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        assert!(min_x <= -4.99 && max_x >= 4.99);
        assert!(min_y <= -4.99 && max_y >= 4.99);
    }

    #[test]
    fn zero_radius_arc_warns_and_skips() {
        let mut builder = MeshBuilder::new();
        let result = draw_arc(
            &mut builder,
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 0.0),
            ArcDirection::CounterClockwise,
            &Aperture::Circle { diameter: 1.0 },
        );
        assert!(result.is_ok());
        let mesh = builder.finish();
        assert_eq!(mesh.vertex_count, 0);
        assert!(mesh.warnings.iter().any(|w| w.contains("zero radius")));
    }

    #[test]
    fn coincident_endpoints_with_zero_offset_warn_and_skip() {
        let mut builder = MeshBuilder::new();
        let result = draw_arc(
            &mut builder,
            Point::new(1.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 0.0),
            ArcDirection::Clockwise,
            &Aperture::Circle { diameter: 1.0 },
        );
        assert!(result.is_ok());
        let mesh = builder.finish();
        assert_eq!(mesh.vertex_count, 0);
        assert_eq!(mesh.warning_count, 1);
    }

    #[test]
    fn mismatched_radii_warn_and_average() {
        let mut builder = MeshBuilder::new();
        let points = centerline(
            &mut builder,
            Point::new(5.0, 0.0),
            Point::new(0.0, 5.2),
            Point::new(-5.0, 0.0),
            ArcDirection::CounterClockwise,
        )
        .expect("arc should tessellate despite mismatch");
        assert!(!points.is_empty());
        let mesh = builder.finish();
        assert!(mesh.warnings.iter().any(|w| w.contains("radii mismatch")));
    }

    #[test]
    fn draw_arc_emits_widened_geometry() {
        let mut builder = MeshBuilder::new();
        draw_arc(
            &mut builder,
            Point::new(5.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(-5.0, 0.0),
            ArcDirection::CounterClockwise,
            &Aperture::Circle { diameter: 1.0 },
        )
        .expect("arc draw should succeed");
        let mesh = builder.finish();
        assert!(mesh.vertex_count > 0);
        assert!(!mesh.indices.is_empty());
        // Widened arc stays within radius + half stroke.
        assert!(mesh.bounds.max_x <= 5.5 + 1e-6);
        assert!(mesh.bounds.max_y <= 5.5 + 1e-6);
    }

    #[test]
    fn negative_stroke_diameter_warns_once_not_per_chord() {
        let mut builder = MeshBuilder::new();
        draw_arc(
            &mut builder,
            Point::new(5.0, 0.0),
            Point::new(0.0, 5.0),
            Point::new(-5.0, 0.0),
            ArcDirection::CounterClockwise,
            &Aperture::Circle { diameter: -1.0 },
        )
        .expect("arc draw should succeed");
        let mesh = builder.finish();
        let negative_warnings = mesh
            .warnings
            .iter()
            .filter(|w| w.contains("negative"))
            .count();
        assert_eq!(negative_warnings, 1);
    }
}
