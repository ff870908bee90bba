//! Linear stroke widening for D01 draws.

use std::f64::consts::FRAC_PI_2;

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::types::{Aperture, Point};

use super::aperture::{flash, normalize_dimension, push_semi_circle, ENDCAP_SEGMENTS};

/// Widen a linear draw into a quad, with semicircular endcaps when the
/// aperture is round.
pub fn draw_linear(
    builder: &mut MeshBuilder,
    from: Point,
    to: Point,
    aperture: &Aperture,
) -> Result<(), GeometryError> {
    let Some(width) = resolve_stroke_width(builder, aperture)? else {
        return Ok(());
    };

    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let length_sq = dx.mul_add(dx, dy * dy);
    if length_sq <= f64::EPSILON {
        return handle_zero_length(builder, from, aperture);
    }

    let length = length_sq.sqrt();
    let dir_x = dx / length;
    let dir_y = dy / length;
    let normal_x = -dir_y;
    let normal_y = dir_x;
    let half = width / 2.0;

    let a = builder.push_vertex(
        normal_x.mul_add(half, from.x),
        normal_y.mul_add(half, from.y),
    );
    let b = builder.push_vertex(
        normal_x.mul_add(-half, from.x),
        normal_y.mul_add(-half, from.y),
    );
    let c = builder.push_vertex(normal_x.mul_add(-half, to.x), normal_y.mul_add(-half, to.y));
    let d = builder.push_vertex(normal_x.mul_add(half, to.x), normal_y.mul_add(half, to.y));
    if let (Some(a), Some(b), Some(c), Some(d)) = (a, b, c, d) {
        builder.push_quad(a, b, c, d);
    }

    if matches!(aperture, Aperture::Circle { .. }) {
        let heading = dir_y.atan2(dir_x);
        push_semi_circle(
            builder,
            from,
            half,
            heading + FRAC_PI_2,
            heading + 3.0 * FRAC_PI_2,
            ENDCAP_SEGMENTS,
        );
        push_semi_circle(
            builder,
            to,
            half,
            heading - FRAC_PI_2,
            heading + FRAC_PI_2,
            ENDCAP_SEGMENTS,
        );
    }

    Ok(())
}

fn handle_zero_length(
    builder: &mut MeshBuilder,
    position: Point,
    aperture: &Aperture,
) -> Result<(), GeometryError> {
    if matches!(aperture, Aperture::Circle { .. }) {
        return flash(builder, aperture, position);
    }
    builder.warn("zero-length draw with a non-circular aperture; skipping".to_string());
    Ok(())
}

/// Effective stroke width of an aperture used for a D01 draw.
///
/// Circles stroke at their diameter. Rectangles and obrounds stroke at
/// `min(width, height)` — the Gerber spec only fully defines round and
/// rectangular draws, and real CAD output almost never strokes rectangles.
/// Polygons stroke at their bounding diameter.
pub(crate) fn resolve_stroke_width(
    builder: &mut MeshBuilder,
    aperture: &Aperture,
) -> Result<Option<f64>, GeometryError> {
    match aperture {
        Aperture::Circle { diameter } => {
            normalize_dimension(builder, *diameter, "circle diameter")
        }
        Aperture::Rectangle { width, height } | Aperture::Obround { width, height } => {
            let Some(width) = normalize_dimension(builder, *width, "stroke width")? else {
                return Ok(None);
            };
            let Some(height) = normalize_dimension(builder, *height, "stroke height")? else {
                return Ok(None);
            };
            Ok(Some(width.min(height)))
        }
        Aperture::Polygon { diameter, .. } => {
            normalize_dimension(builder, *diameter, "polygon diameter")
        }
        Aperture::Macro { name, .. } => Err(GeometryError::UnsupportedFeature(format!(
            "macro aperture `{name}` cannot be used for stroked draws"
        ))),
    }
}
