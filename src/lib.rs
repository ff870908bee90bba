//! Gerber RS-274X and Excellon drill parsing into GPU-ready triangle meshes.
//!
//! Two pure entry points consume raw file bytes and return a [`LayerMesh`]:
//! interleaved f32 positions, u32 triangle indices, a bounding box, counters,
//! warnings, and the clear-polarity index ranges. No I/O, no globals; each
//! call builds and returns one exclusively-owned record, so concurrent parses
//! on different threads never share state.
//!
//! ```
//! let mesh = gerber_mesh::parse_gerber(
//!     b"%FSLAX24Y24*%%MOMM*%%ADD10C,1.0*%D10*X0Y0D03*M02*",
//! )
//! .unwrap();
//! assert_eq!(mesh.index_count % 3, 0);
//! ```

pub mod builder;
pub mod error;
pub mod excellon;
pub mod gerber;
pub mod geometry;
pub mod types;

pub use error::{GeometryError, ParseError};
pub use types::{Aperture, BoundingBox, LayerMesh, Point};

/// Parse a Gerber RS-274X file.
///
/// Recoverable problems (malformed commands, unsupported directives,
/// degenerate geometry, resource limits, truncation) are reported in the
/// mesh's warning list and never abort the parse.
///
/// # Errors
///
/// [`ParseError::EmptyInput`] for an empty slice and
/// [`ParseError::InvalidEncoding`] for non-UTF-8 input or non-ASCII bytes
/// outside comments.
pub fn parse_gerber(data: &[u8]) -> Result<LayerMesh, ParseError> {
    gerber::parse(data)
}

/// Parse an Excellon NC-drill file. Each drill hit becomes a circle flash of
/// the selected tool's diameter.
///
/// # Errors
///
/// [`ParseError::EmptyInput`] for an empty slice and
/// [`ParseError::InvalidEncoding`] for non-UTF-8 input.
pub fn parse_excellon(data: &[u8]) -> Result<LayerMesh, ParseError> {
    excellon::parse(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gerber_entry_returns_owned_record() {
        let data = b"%FSLAX24Y24*%%MOMM*%%ADD10C,1.0*%D10*X0Y0D03*M02*";
        let first = parse_gerber(data).unwrap();
        let second = parse_gerber(data).unwrap();
        // No state leaks across calls.
        assert_eq!(first.positions, second.positions);
        assert_eq!(first.indices, second.indices);
        assert_eq!(first.warning_count, second.warning_count);
    }

    #[test]
    fn excellon_entry_returns_owned_record() {
        let data = b"M48\nMETRIC\nT1C0.8\n%\nT1\nX5000Y5000\nM30\n";
        let mesh = parse_excellon(data).unwrap();
        assert_eq!(mesh.command_count, 1);
        assert!(mesh.vertex_count > 0);
    }

    #[test]
    fn both_entries_reject_empty_input() {
        assert!(parse_gerber(b"").is_err());
        assert!(parse_excellon(b"").is_err());
    }
}
