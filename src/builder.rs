//! Append-only mesh accumulator shared by all geometry producers.

use std::f64::consts::TAU;

use crate::types::{saturate_u32, BoundingBox, LayerMesh};

/// Hard cap on emitted triangles per invocation. Reaching it saturates the
/// builder: the rest of the file is ignored and the partial mesh is returned.
const MAX_TRIANGLES: usize = 10_000_000;

/// Vertex indices must stay below 2^31 so hosts can treat them as signed.
const MAX_VERTEX_INDEX: usize = 1 << 31;

/// Accumulates vertices, triangle indices, bounds, warnings and clear-polarity
/// index ranges, then emits the finished [`LayerMesh`].
///
/// Positions are narrowed to f32 at push time (display precision); the
/// bounding box is tracked in f64.
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<f32>,
    indices: Vec<u32>,
    bounds: BoundingBox,
    warnings: Vec<String>,
    /// Raw `(start, end)` index ranges; coalesced into `(start, len)` on finish.
    clear_ranges: Vec<(u32, u32)>,
    clear_start: Option<u32>,
    saturated: bool,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self {
            positions: Vec::new(),
            indices: Vec::new(),
            bounds: BoundingBox::empty(),
            warnings: Vec::new(),
            clear_ranges: Vec::new(),
            clear_start: None,
            saturated: false,
        }
    }

    /// Add a vertex and return its index.
    ///
    /// Returns `None` when the coordinate is non-finite (warned and skipped),
    /// when the index space is exhausted, or when the builder has saturated.
    pub fn push_vertex(&mut self, x: f64, y: f64) -> Option<u32> {
        if self.saturated {
            return None;
        }
        if !x.is_finite() || !y.is_finite() {
            self.warn(format!("non-finite vertex ({x}, {y}); skipping"));
            return None;
        }
        let idx = self.positions.len() / 2;
        if idx >= MAX_VERTEX_INDEX {
            self.warn("vertex index space exhausted; dropping remaining geometry".to_string());
            log::warn!("mesh builder saturated at {idx} vertices");
            self.saturated = true;
            return None;
        }
        self.positions.push(x as f32);
        self.positions.push(y as f32);
        self.bounds.expand(x, y);
        Some(idx as u32)
    }

    /// Add a triangle. Indices must reference already-pushed vertices;
    /// anything else is dropped with a warning.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        if self.saturated {
            return;
        }
        let vertex_count = (self.positions.len() / 2) as u32;
        if a >= vertex_count || b >= vertex_count || c >= vertex_count {
            self.warn(format!(
                "triangle ({a}, {b}, {c}) references a missing vertex; dropped"
            ));
            return;
        }
        if self.indices.len() / 3 >= MAX_TRIANGLES {
            self.warn(format!(
                "triangle budget of {MAX_TRIANGLES} exhausted; dropping remaining geometry"
            ));
            log::warn!("mesh builder saturated at {MAX_TRIANGLES} triangles");
            self.saturated = true;
            return;
        }
        self.indices.push(a);
        self.indices.push(b);
        self.indices.push(c);
    }

    /// Add a quad as two triangles `(a, b, c)` and `(a, c, d)`.
    pub fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.push_triangle(a, b, c);
        self.push_triangle(a, c, d);
    }

    /// Add a filled N-gon: centre vertex first, then `segments` perimeter
    /// vertices and a fan of `segments` triangles wrapping around.
    ///
    /// Returns the centre vertex index.
    pub fn push_ngon(&mut self, cx: f64, cy: f64, radius: f64, segments: u32) -> Option<u32> {
        let segments = segments.max(3);
        let center = self.push_vertex(cx, cy)?;
        for i in 0..segments {
            let angle = TAU * f64::from(i) / f64::from(segments);
            self.push_vertex(
                radius.mul_add(angle.cos(), cx),
                radius.mul_add(angle.sin(), cy),
            )?;
        }
        let first = center + 1;
        for i in 0..segments {
            let next = (i + 1) % segments;
            self.push_triangle(center, first + i, first + next);
        }
        Some(center)
    }

    /// Record a warning. Warnings survive into the output record in order.
    pub fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Mark the current index count as the start of a clear-polarity run.
    /// Idempotent while a range is already open.
    pub fn open_clear_range(&mut self) {
        if self.clear_start.is_none() {
            self.clear_start = Some(self.index_count());
        }
    }

    /// Close the open clear run, if any. Zero-length runs are discarded.
    pub fn close_clear_range(&mut self) {
        if let Some(start) = self.clear_start.take() {
            let end = self.index_count();
            if end > start {
                self.clear_ranges.push((start, end));
            }
        }
    }

    pub fn vertex_count(&self) -> u32 {
        saturate_u32(self.positions.len() / 2)
    }

    /// Current length of the index buffer (3 × triangle count).
    pub fn index_count(&self) -> u32 {
        saturate_u32(self.indices.len())
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    /// Copy of the positions from `start_vertex` to the end.
    pub(crate) fn positions_from(&self, start_vertex: u32) -> Vec<f32> {
        let from = (start_vertex as usize) * 2;
        self.positions.get(from..).unwrap_or(&[]).to_vec()
    }

    /// Copy of the indices from `start_index` to the end.
    pub(crate) fn indices_from(&self, start_index: u32) -> Vec<u32> {
        self.indices.get(start_index as usize..).unwrap_or(&[]).to_vec()
    }

    /// Roll the buffers back to the given counts and rescan the bounds.
    /// Clear ranges beyond the cut are dropped.
    pub(crate) fn truncate_to(&mut self, vertex_count: u32, index_count: u32) {
        self.positions.truncate((vertex_count as usize) * 2);
        self.indices.truncate(index_count as usize);
        self.clear_ranges.retain(|&(start, _)| start < index_count);
        for range in &mut self.clear_ranges {
            range.1 = range.1.min(index_count);
        }
        if let Some(start) = self.clear_start {
            self.clear_start = Some(start.min(index_count));
        }
        self.bounds = BoundingBox::empty();
        for pair in self.positions.chunks_exact(2) {
            if let [x, y] = *pair {
                self.bounds.expand(f64::from(x), f64::from(y));
            }
        }
    }

    /// Consume the builder and emit the finished mesh.
    ///
    /// Any open clear range is closed, overlapping ranges are coalesced and
    /// converted to `(first_index, length)` pairs, and an empty bounding box
    /// collapses to all zeros. `command_count` is left at 0 for the caller.
    pub fn finish(mut self) -> LayerMesh {
        self.close_clear_range();

        let bounds = if self.positions.is_empty() {
            BoundingBox::ZERO
        } else {
            self.bounds
        };

        let vertex_count = saturate_u32(self.positions.len() / 2);
        let index_count = saturate_u32(self.indices.len());
        let warning_count = saturate_u32(self.warnings.len());
        let clear_ranges = coalesce_ranges(self.clear_ranges);

        LayerMesh {
            positions: self.positions,
            indices: self.indices,
            bounds,
            command_count: 0,
            vertex_count,
            index_count,
            warning_count,
            warnings: self.warnings,
            clear_ranges,
        }
    }
}

/// Merge overlapping or touching `(start, end)` ranges and convert to
/// `(start, len)` pairs. Zero-length input ranges are dropped.
fn coalesce_ranges(mut raw: Vec<(u32, u32)>) -> Vec<(u32, u32)> {
    raw.retain(|&(start, end)| end > start);
    raw.sort_unstable_by_key(|&(start, _)| start);

    let mut merged: Vec<(u32, u32)> = Vec::with_capacity(raw.len());
    for (start, end) in raw {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .map(|(start, end)| (start, end - start))
        .collect()
}
