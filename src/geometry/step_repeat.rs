//! Step-repeat expansion: duplicate a captured builder range on a grid.

use crate::builder::MeshBuilder;
use crate::error::GeometryError;

/// Duplicate everything emitted since `start_vertex`/`start_index` at each
/// grid position other than (0, 0), which is the block already in place.
///
/// Copies appear in row-major order: `j` (rows) major, `i` (columns) minor.
/// A zero repeat count discards the captured block entirely with a warning,
/// so an n×m repeat always yields exactly n·m·block triangles.
pub fn expand_grid(
    builder: &mut MeshBuilder,
    start_vertex: u32,
    start_index: u32,
    repeat_x: u32,
    repeat_y: u32,
    step_x: f64,
    step_y: f64,
) -> Result<(), GeometryError> {
    if repeat_x == 0 || repeat_y == 0 {
        builder.warn(format!(
            "step-repeat grid {repeat_x}x{repeat_y} has a zero count; discarding block"
        ));
        builder.truncate_to(start_vertex, start_index);
        return Ok(());
    }

    let block_positions = builder.positions_from(start_vertex);
    let block_indices = builder.indices_from(start_index);
    if block_positions.is_empty() {
        return Ok(());
    }

    for iy in 0..repeat_y {
        for ix in 0..repeat_x {
            if ix == 0 && iy == 0 {
                continue;
            }
            let offset_x = f64::from(ix) * step_x;
            let offset_y = f64::from(iy) * step_y;

            let base = builder.vertex_count();
            for pair in block_positions.chunks_exact(2) {
                if let [x, y] = *pair {
                    if builder
                        .push_vertex(f64::from(x) + offset_x, f64::from(y) + offset_y)
                        .is_none()
                    {
                        return Ok(());
                    }
                }
            }

            for tri in block_indices.chunks_exact(3) {
                if let [a, b, c] = *tri {
                    // Triangles referencing vertices outside the block cannot
                    // be rebased.
                    if a < start_vertex || b < start_vertex || c < start_vertex {
                        continue;
                    }
                    builder.push_triangle(
                        a - start_vertex + base,
                        b - start_vertex + base,
                        c - start_vertex + base,
                    );
                }
            }
        }
    }

    Ok(())
}
