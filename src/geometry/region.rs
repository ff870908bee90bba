//! Region fill: triangulation of closed G36/G37 boundaries.
//!
//! Boundaries arrive pre-tessellated (arcs already chorded). Convex rings are
//! fan-triangulated directly; everything else goes through ear clipping with
//! a fan fallback for self-intersecting input.

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::types::Point;

const POINT_EQUALITY_EPSILON: f64 = 1e-9;
const AREA_EPSILON: f64 = 1e-9;

/// Triangulate a closed polygon boundary into the builder.
///
/// Consecutive duplicate points are removed and an unclosed boundary is
/// treated as closed. Degenerate boundaries (under three distinct points,
/// zero area) are skipped with a warning.
pub fn fill_region(builder: &mut MeshBuilder, boundary: &[Point]) -> Result<(), GeometryError> {
    let mut points: Vec<Point> = Vec::with_capacity(boundary.len());
    for &p in boundary {
        match points.last() {
            Some(last) if approx_equal(*last, p) => {}
            _ => points.push(p),
        }
    }

    // The ring is cyclic; a closing duplicate would make a degenerate corner.
    if points.len() > 1 {
        if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
            if approx_equal(first, last) {
                points.pop();
            }
        }
    }

    if points.len() < 3 {
        builder.warn(format!(
            "region boundary has {} distinct point(s); need at least 3; skipping",
            points.len()
        ));
        return Ok(());
    }

    let area = signed_area(&points);
    if area.abs() <= AREA_EPSILON {
        builder.warn("region boundary encloses zero area; skipping".to_string());
        return Ok(());
    }
    if area < 0.0 {
        points.reverse();
    }

    let mut vertex_ids = Vec::with_capacity(points.len());
    for p in &points {
        match builder.push_vertex(p.x, p.y) {
            Some(id) => vertex_ids.push(id),
            None => return Ok(()),
        }
    }

    if is_convex(&points) {
        emit_fan(builder, &vertex_ids, &(0..points.len()).collect::<Vec<_>>());
        return Ok(());
    }

    let mut ring: Vec<usize> = (0..points.len()).collect();
    while ring.len() > 3 {
        let Some(k) = find_ear(&points, &ring) else {
            builder.warn(
                "region boundary is self-intersecting or twisted; falling back to fan triangulation"
                    .to_string(),
            );
            emit_fan(builder, &vertex_ids, &ring);
            return Ok(());
        };
        let n = ring.len();
        let prev = ring[(k + n - 1) % n];
        let next = ring[(k + 1) % n];
        builder.push_triangle(vertex_ids[prev], vertex_ids[ring[k]], vertex_ids[next]);
        ring.remove(k);
    }
    builder.push_triangle(vertex_ids[ring[0]], vertex_ids[ring[1]], vertex_ids[ring[2]]);
    Ok(())
}

/// Pick the ear with the smallest interior angle. An ear is a strictly convex
/// corner whose triangle contains no other remaining boundary vertex.
fn find_ear(points: &[Point], ring: &[usize]) -> Option<usize> {
    let n = ring.len();
    let mut best: Option<(usize, f64)> = None;

    for k in 0..n {
        let prev_slot = (k + n - 1) % n;
        let next_slot = (k + 1) % n;
        let a = points[ring[prev_slot]];
        let b = points[ring[k]];
        let c = points[ring[next_slot]];

        if cross(a, b, c) <= POINT_EQUALITY_EPSILON {
            continue;
        }

        let blocked = ring.iter().enumerate().any(|(slot, &idx)| {
            slot != k
                && slot != prev_slot
                && slot != next_slot
                && point_in_triangle(points[idx], a, b, c)
        });
        if blocked {
            continue;
        }

        let angle = interior_angle(a, b, c);
        match best {
            Some((_, best_angle)) if best_angle <= angle => {}
            _ => best = Some((k, angle)),
        }
    }

    best.map(|(k, _)| k)
}

fn emit_fan(builder: &mut MeshBuilder, vertex_ids: &[u32], ring: &[usize]) {
    for w in 1..ring.len().saturating_sub(1) {
        builder.push_triangle(
            vertex_ids[ring[0]],
            vertex_ids[ring[w]],
            vertex_ids[ring[w + 1]],
        );
    }
}

fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    points.iter().enumerate().all(|(k, &b)| {
        let a = points[(k + n - 1) % n];
        let c = points[(k + 1) % n];
        cross(a, b, c) >= -POINT_EQUALITY_EPSILON
    })
}

/// Shoelace area; positive for counter-clockwise winding.
fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    let mut sum = 0.0;
    for (k, p) in points.iter().enumerate() {
        let q = points[(k + 1) % n];
        sum += p.x.mul_add(q.y, -(q.x * p.y));
    }
    sum / 2.0
}

/// Cross product of (a→b) × (b→c).
fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x).mul_add(c.y - b.y, -((b.y - a.y) * (c.x - b.x)))
}

fn point_in_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    if approx_equal(p, a) || approx_equal(p, b) || approx_equal(p, c) {
        return false;
    }
    let d1 = cross(a, b, p);
    let d2 = cross(b, c, p);
    let d3 = cross(c, a, p);
    d1 >= -POINT_EQUALITY_EPSILON && d2 >= -POINT_EQUALITY_EPSILON && d3 >= -POINT_EQUALITY_EPSILON
}

fn interior_angle(a: Point, b: Point, c: Point) -> f64 {
    let u = (a.x - b.x, a.y - b.y);
    let v = (c.x - b.x, c.y - b.y);
    let dot = u.0.mul_add(v.0, u.1 * v.1);
    let len = u.0.hypot(u.1) * v.0.hypot(v.1);
    if len <= f64::EPSILON {
        return 0.0;
    }
    (dot / len).clamp(-1.0, 1.0).acos()
}

fn approx_equal(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= POINT_EQUALITY_EPSILON && (a.y - b.y).abs() <= POINT_EQUALITY_EPSILON
}
