use thiserror::Error;

/// Fatal errors returned by the entry points.
///
/// Everything else that can go wrong during a parse is demoted to a warning
/// on the output record; the parse continues and a partial mesh is returned.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("empty input")]
    EmptyInput,

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),
}

/// Recoverable failures raised by the geometry producers.
///
/// The interpreter catches these and records them as warnings; no variant
/// ever aborts a parse.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("undefined reference: {0}")]
    UndefinedReference(String),

    #[error("invalid aperture: {0}")]
    InvalidAperture(String),

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("arithmetic error: {0}")]
    ArithmeticError(String),

    #[error("resource limit: {0}")]
    ResourceLimit(String),
}
