//! Gerber RS-274X parsing pipeline: bytes → tokens → commands → mesh.

pub mod commands;
pub mod coord;
pub mod interpreter;
pub mod lexer;
pub mod macros;

use crate::error::ParseError;
use crate::types::LayerMesh;

/// Parse a single Gerber file into a triangle mesh.
///
/// # Errors
///
/// Only empty input and invalid encodings fail; all other problems are
/// reported as warnings on the (possibly partial) returned mesh.
pub fn parse(data: &[u8]) -> Result<LayerMesh, ParseError> {
    if data.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let text = std::str::from_utf8(data)
        .map_err(|err| ParseError::InvalidEncoding(err.to_string()))?;

    let tokens = lexer::tokenize(text)?;
    let (commands, warnings) = commands::parse_commands(&tokens);
    Ok(interpreter::interpret(&commands, warnings))
}
