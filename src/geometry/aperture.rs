//! Aperture flash expansion for D03 commands.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::types::{Aperture, Point};

pub(crate) const CIRCLE_SEGMENTS: u32 = 32;
pub(crate) const ENDCAP_SEGMENTS: u32 = 16;

const MIN_POLYGON_VERTICES: u32 = 3;
const MAX_POLYGON_VERTICES: u32 = 12;

/// Expand a flashed aperture at `position` into triangles.
///
/// Macro apertures are resolved by the interpreter before this point; seeing
/// one here is reported as unsupported.
pub fn flash(
    builder: &mut MeshBuilder,
    aperture: &Aperture,
    position: Point,
) -> Result<(), GeometryError> {
    match aperture {
        Aperture::Circle { diameter } => flash_circle(builder, *diameter, position),
        Aperture::Rectangle { width, height } => {
            flash_rectangle(builder, *width, *height, position)
        }
        Aperture::Obround { width, height } => flash_obround(builder, *width, *height, position),
        Aperture::Polygon {
            diameter,
            vertices,
            rotation,
        } => flash_polygon(builder, *diameter, *vertices, *rotation, position),
        Aperture::Macro { name, .. } => Err(GeometryError::UnsupportedFeature(format!(
            "macro aperture `{name}` must be evaluated, not flashed directly"
        ))),
    }
}

/// Validate an aperture dimension: negative values are absolute-valued with a
/// warning, zero values skip the shape with a warning, non-finite values are
/// an error. Returns `None` when the shape should be skipped.
pub(crate) fn normalize_dimension(
    builder: &mut MeshBuilder,
    value: f64,
    label: &str,
) -> Result<Option<f64>, GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::InvalidAperture(format!(
            "{label} must be finite, got {value}"
        )));
    }

    let mut normalized = value;
    if normalized < 0.0 {
        builder.warn(format!(
            "{label} is negative ({normalized}); using absolute value"
        ));
        normalized = normalized.abs();
    }

    if normalized <= f64::EPSILON {
        builder.warn(format!("{label} is zero; emitting no geometry"));
        return Ok(None);
    }

    Ok(Some(normalized))
}

fn flash_circle(
    builder: &mut MeshBuilder,
    diameter: f64,
    position: Point,
) -> Result<(), GeometryError> {
    let Some(diameter) = normalize_dimension(builder, diameter, "circle diameter")? else {
        return Ok(());
    };
    builder.push_ngon(position.x, position.y, diameter / 2.0, CIRCLE_SEGMENTS);
    Ok(())
}

fn flash_rectangle(
    builder: &mut MeshBuilder,
    width: f64,
    height: f64,
    position: Point,
) -> Result<(), GeometryError> {
    let Some(width) = normalize_dimension(builder, width, "rectangle width")? else {
        return Ok(());
    };
    let Some(height) = normalize_dimension(builder, height, "rectangle height")? else {
        return Ok(());
    };
    push_centered_rectangle(builder, position, width, height);
    Ok(())
}

fn flash_obround(
    builder: &mut MeshBuilder,
    width: f64,
    height: f64,
    position: Point,
) -> Result<(), GeometryError> {
    let Some(width) = normalize_dimension(builder, width, "obround width")? else {
        return Ok(());
    };
    let Some(height) = normalize_dimension(builder, height, "obround height")? else {
        return Ok(());
    };

    if (width - height).abs() <= f64::EPSILON {
        builder.push_ngon(position.x, position.y, width / 2.0, CIRCLE_SEGMENTS);
        return Ok(());
    }

    if width > height {
        let radius = height / 2.0;
        let body = width - height;
        let half_body = body / 2.0;
        push_centered_rectangle(builder, position, body, height);
        push_semi_circle(
            builder,
            Point::new(position.x - half_body, position.y),
            radius,
            FRAC_PI_2,
            3.0 * FRAC_PI_2,
            ENDCAP_SEGMENTS,
        );
        push_semi_circle(
            builder,
            Point::new(position.x + half_body, position.y),
            radius,
            -FRAC_PI_2,
            FRAC_PI_2,
            ENDCAP_SEGMENTS,
        );
    } else {
        let radius = width / 2.0;
        let body = height - width;
        let half_body = body / 2.0;
        push_centered_rectangle(builder, position, width, body);
        push_semi_circle(
            builder,
            Point::new(position.x, position.y + half_body),
            radius,
            0.0,
            PI,
            ENDCAP_SEGMENTS,
        );
        push_semi_circle(
            builder,
            Point::new(position.x, position.y - half_body),
            radius,
            PI,
            TAU,
            ENDCAP_SEGMENTS,
        );
    }

    Ok(())
}

fn flash_polygon(
    builder: &mut MeshBuilder,
    diameter: f64,
    vertices: u32,
    rotation_degrees: f64,
    position: Point,
) -> Result<(), GeometryError> {
    let Some(diameter) = normalize_dimension(builder, diameter, "polygon diameter")? else {
        return Ok(());
    };

    if !rotation_degrees.is_finite() {
        return Err(GeometryError::InvalidAperture(format!(
            "polygon rotation must be finite, got {rotation_degrees}"
        )));
    }

    let mut sides = vertices;
    if !(MIN_POLYGON_VERTICES..=MAX_POLYGON_VERTICES).contains(&sides) {
        sides = sides.clamp(MIN_POLYGON_VERTICES, MAX_POLYGON_VERTICES);
        builder.warn(format!(
            "polygon vertex count {vertices} outside [{MIN_POLYGON_VERTICES}, {MAX_POLYGON_VERTICES}]; clamped to {sides}"
        ));
    }

    let radius = diameter / 2.0;
    let rotation = rotation_degrees.rem_euclid(360.0).to_radians();

    let Some(center) = builder.push_vertex(position.x, position.y) else {
        return Ok(());
    };
    for i in 0..sides {
        let angle = rotation + TAU * f64::from(i) / f64::from(sides);
        let x = radius.mul_add(angle.cos(), position.x);
        let y = radius.mul_add(angle.sin(), position.y);
        if builder.push_vertex(x, y).is_none() {
            return Ok(());
        }
    }

    let first = center + 1;
    for i in 0..sides {
        let next = (i + 1) % sides;
        builder.push_triangle(center, first + i, first + next);
    }

    Ok(())
}

/// Four corners counter-clockwise, two triangles.
pub(crate) fn push_centered_rectangle(
    builder: &mut MeshBuilder,
    center: Point,
    width: f64,
    height: f64,
) {
    let half_w = width / 2.0;
    let half_h = height / 2.0;
    let a = builder.push_vertex(center.x - half_w, center.y - half_h);
    let b = builder.push_vertex(center.x + half_w, center.y - half_h);
    let c = builder.push_vertex(center.x + half_w, center.y + half_h);
    let d = builder.push_vertex(center.x - half_w, center.y + half_h);
    if let (Some(a), Some(b), Some(c), Some(d)) = (a, b, c, d) {
        builder.push_quad(a, b, c, d);
    }
}

/// Fan of `segments` triangles covering the angular span from `start_angle`
/// to `end_angle` around `center`.
pub(crate) fn push_semi_circle(
    builder: &mut MeshBuilder,
    center: Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    segments: u32,
) {
    let Some(center_index) = builder.push_vertex(center.x, center.y) else {
        return;
    };
    let segments = segments.max(1);
    let step = (end_angle - start_angle) / f64::from(segments);

    let mut previous: Option<u32> = None;
    for i in 0..=segments {
        let angle = step.mul_add(f64::from(i), start_angle);
        let x = radius.mul_add(angle.cos(), center.x);
        let y = radius.mul_add(angle.sin(), center.y);
        let Some(current) = builder.push_vertex(x, y) else {
            return;
        };
        if let Some(previous) = previous {
            builder.push_triangle(center_index, previous, current);
        }
        previous = Some(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerMesh;

    const EPSILON: f64 = 1e-6;

    fn flash_and_build(aperture: Aperture, position: Point) -> LayerMesh {
        let mut builder = MeshBuilder::new();
        flash(&mut builder, &aperture, position).expect("flash should succeed");
        builder.finish()
    }

    #[test]
    fn circle_flash_is_centre_plus_32_perimeter() {
        let mesh = flash_and_build(Aperture::Circle { diameter: 1.0 }, Point::new(0.0, 0.0));
        assert_eq!(mesh.vertex_count, 33);
        assert_eq!(mesh.indices.len(), 96);
    }

    #[test]
    fn circle_perimeter_vertices_sit_on_radius() {
        let mesh = flash_and_build(Aperture::Circle { diameter: 2.0 }, Point::new(5.0, 3.0));
        for pair in mesh.positions.chunks_exact(2).skip(1) {
            if let [x, y] = pair {
                let dx = f64::from(*x) - 5.0;
                let dy = f64::from(*y) - 3.0;
                assert!((dx.hypot(dy) - 1.0).abs() < EPSILON);
            }
        }
    }

    #[test]
    fn rectangle_flash_emits_expected_corners() {
        let mesh = flash_and_build(
            Aperture::Rectangle {
                width: 2.0,
                height: 1.0,
            },
            Point::new(0.0, 0.0),
        );
        assert_eq!(mesh.vertex_count, 4);
        assert_eq!(
            mesh.positions,
            vec![-1.0_f32, -0.5, 1.0, -0.5, 1.0, 0.5, -1.0, 0.5]
        );
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn horizontal_obround_covers_expected_bounds() {
        let mesh = flash_and_build(
            Aperture::Obround {
                width: 3.0,
                height: 1.0,
            },
            Point::new(0.0, 0.0),
        );
        assert!(mesh.vertex_count > 4);
        assert!((mesh.bounds.min_x + 1.5).abs() < EPSILON);
        assert!((mesh.bounds.max_x - 1.5).abs() < EPSILON);
        assert!((mesh.bounds.min_y + 0.5).abs() < EPSILON);
        assert!((mesh.bounds.max_y - 0.5).abs() < EPSILON);
    }

    #[test]
    fn vertical_obround_covers_expected_bounds() {
        let mesh = flash_and_build(
            Aperture::Obround {
                width: 1.0,
                height: 3.0,
            },
            Point::new(0.0, 0.0),
        );
        assert!((mesh.bounds.min_y + 1.5).abs() < EPSILON);
        assert!((mesh.bounds.max_y - 1.5).abs() < EPSILON);
        assert!((mesh.bounds.max_x - 0.5).abs() < EPSILON);
    }

    #[test]
    fn square_obround_degenerates_to_circle() {
        let mesh = flash_and_build(
            Aperture::Obround {
                width: 1.0,
                height: 1.0,
            },
            Point::new(0.0, 0.0),
        );
        assert_eq!(mesh.vertex_count, 33);
    }

    #[test]
    fn polygon_flash_applies_rotation() {
        let mesh = flash_and_build(
            Aperture::Polygon {
                diameter: 2.0,
                vertices: 6,
                rotation: 30.0,
            },
            Point::new(0.0, 0.0),
        );
        assert_eq!(mesh.vertex_count, 7);
        // First perimeter vertex at 30 degrees on the unit circle.
        let x = f64::from(mesh.positions[2]);
        let y = f64::from(mesh.positions[3]);
        assert!((x - 30.0_f64.to_radians().cos()).abs() < EPSILON);
        assert!((y - 30.0_f64.to_radians().sin()).abs() < EPSILON);
    }

    #[test]
    fn polygon_rotation_is_periodic_in_360() {
        let a = flash_and_build(
            Aperture::Polygon {
                diameter: 2.0,
                vertices: 5,
                rotation: 72.0,
            },
            Point::new(1.0, 1.0),
        );
        let b = flash_and_build(
            Aperture::Polygon {
                diameter: 2.0,
                vertices: 5,
                rotation: 72.0 + 360.0,
            },
            Point::new(1.0, 1.0),
        );
        assert_eq!(a.vertex_count, b.vertex_count);
        for (va, vb) in a.positions.iter().zip(b.positions.iter()) {
            assert!((va - vb).abs() < 1e-5);
        }
    }

    #[test]
    fn polygon_vertex_count_is_clamped_with_warning() {
        let mesh = flash_and_build(
            Aperture::Polygon {
                diameter: 2.0,
                vertices: 40,
                rotation: 0.0,
            },
            Point::new(0.0, 0.0),
        );
        assert_eq!(mesh.vertex_count, 13);
        assert!(mesh.warnings.iter().any(|w| w.contains("clamped")));
    }

    #[test]
    fn zero_diameter_circle_skips_with_warning() {
        let mesh = flash_and_build(Aperture::Circle { diameter: 0.0 }, Point::new(0.0, 0.0));
        assert_eq!(mesh.vertex_count, 0);
        assert!(mesh.warnings.iter().any(|w| w.contains("zero")));
    }

    #[test]
    fn negative_rectangle_uses_absolute_value_with_warning() {
        let mesh = flash_and_build(
            Aperture::Rectangle {
                width: -2.0,
                height: -1.0,
            },
            Point::new(0.0, 0.0),
        );
        assert_eq!(mesh.vertex_count, 4);
        assert!((mesh.bounds.min_x + 1.0).abs() < EPSILON);
        assert!((mesh.bounds.max_x - 1.0).abs() < EPSILON);
        assert!(mesh.warnings.iter().any(|w| w.contains("negative")));
    }

    #[test]
    fn non_finite_dimension_is_an_error() {
        let mut builder = MeshBuilder::new();
        let result = flash(
            &mut builder,
            &Aperture::Circle {
                diameter: f64::NAN,
            },
            Point::new(0.0, 0.0),
        );
        assert!(result.is_err());
    }

    #[test]
    fn macro_aperture_is_rejected_here() {
        let mut builder = MeshBuilder::new();
        let result = flash(
            &mut builder,
            &Aperture::Macro {
                name: "OC8".to_string(),
                params: vec![1.0],
            },
            Point::new(0.0, 0.0),
        );
        assert!(matches!(
            result,
            Err(GeometryError::UnsupportedFeature(_))
        ));
    }
}
