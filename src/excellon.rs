//! Excellon NC-drill parsing. Each drill hit is flashed as a filled circle.

use std::collections::HashMap;

use crate::builder::MeshBuilder;
use crate::error::ParseError;
use crate::geometry::aperture;
use crate::types::{saturate_u32, Aperture, LayerMesh, Point};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Units {
    Metric,
    Inch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZeroSuppression {
    /// Leading zeros omitted: pad on the left.
    Leading,
    /// Trailing zeros omitted: pad on the right.
    Trailing,
}

#[derive(Debug)]
struct ParserState {
    units: Units,
    integer_digits: u8,
    decimal_digits: u8,
    suppression: ZeroSuppression,
    /// Tool number → diameter in millimetres.
    tools: HashMap<u32, f64>,
    current_tool: Option<u32>,
    hole_count: usize,
    in_header: bool,
    terminated: bool,
    warned_routing: bool,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            units: Units::Inch,
            integer_digits: 2,
            decimal_digits: 4,
            suppression: ZeroSuppression::Leading,
            tools: HashMap::new(),
            current_tool: None,
            hole_count: 0,
            in_header: false,
            terminated: false,
            warned_routing: false,
        }
    }
}

/// Parse an Excellon drill file into a triangle mesh.
///
/// # Errors
///
/// Only empty input and invalid encodings fail; everything else degrades to
/// warnings on the returned mesh.
pub fn parse(data: &[u8]) -> Result<LayerMesh, ParseError> {
    if data.is_empty() {
        return Err(ParseError::EmptyInput);
    }
    let content = std::str::from_utf8(data)
        .map_err(|err| ParseError::InvalidEncoding(err.to_string()))?;

    let mut builder = MeshBuilder::new();
    let mut state = ParserState::default();

    if !content
        .lines()
        .any(|line| line.trim().eq_ignore_ascii_case("M48"))
    {
        builder.warn(
            "missing M48 header; assuming inch 2.4 format with leading-zero suppression"
                .to_string(),
        );
    }

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let upper = line.to_ascii_uppercase();

        if upper == "M48" {
            state.in_header = true;
            continue;
        }
        if upper == "%" || upper == "M95" {
            state.in_header = false;
            continue;
        }
        if upper == "M30" {
            state.terminated = true;
            break;
        }

        if state.in_header {
            parse_header_line(&upper, &mut state, &mut builder);
        } else {
            parse_body_line(&upper, &mut state, &mut builder);
        }
    }

    if !state.terminated {
        builder.warn("truncated file: end-of-program marker M30 not seen".to_string());
        log::warn!("excellon input ended without M30");
    }

    let hole_count = state.hole_count;
    let mut mesh = builder.finish();
    mesh.command_count = saturate_u32(hole_count);
    Ok(mesh)
}

fn parse_header_line(line: &str, state: &mut ParserState, builder: &mut MeshBuilder) {
    if apply_units_directive(line, state) {
        return;
    }
    if let Some((tool, diameter)) = split_tool_definition(line) {
        register_tool(state, builder, tool, diameter);
    }
    // FMAT, ICI, and the other header options carry nothing the mesh needs.
}

fn parse_body_line(line: &str, state: &mut ParserState, builder: &mut MeshBuilder) {
    if apply_units_directive(line, state) {
        return;
    }

    if line.starts_with('G') {
        if is_routing_command(line) && !state.warned_routing {
            builder.warn("routed paths are not supported; skipping routing commands".to_string());
            state.warned_routing = true;
        }
        return;
    }

    if line.starts_with('M') {
        return;
    }

    if let Some((tool, diameter)) = split_tool_definition(line) {
        register_tool(state, builder, tool, diameter);
        return;
    }

    if let Some(tool) = parse_tool_selection(line) {
        if tool == 0 {
            // T0 is the conventional end-of-program tool unload.
            state.current_tool = None;
        } else if state.tools.contains_key(&tool) {
            state.current_tool = Some(tool);
        } else {
            state.current_tool = None;
            builder.warn(format!("tool T{tool} selected but not defined"));
        }
        return;
    }

    if line.starts_with('X') || line.starts_with('Y') {
        let Some((x, y)) = parse_coordinate_line(line, state, builder) else {
            return;
        };
        let Some(tool) = state.current_tool else {
            builder.warn(format!("hole at ({x}, {y}) skipped: no tool selected"));
            return;
        };
        let Some(diameter) = state.tools.get(&tool).copied() else {
            builder.warn(format!(
                "hole at ({x}, {y}) skipped: tool T{tool} is undefined"
            ));
            return;
        };
        if let Err(err) = aperture::flash(
            builder,
            &Aperture::Circle { diameter },
            Point::new(x, y),
        ) {
            builder.warn(err.to_string());
            return;
        }
        state.hole_count += 1;
    }
}

/// `METRIC`/`INCH` (optionally with `,TZ`/`,LZ` and a `000.000` format) and
/// the `M71`/`M72` unit switches.
fn apply_units_directive(line: &str, state: &mut ParserState) -> bool {
    let (units, rest) = if let Some(rest) = line.strip_prefix("METRIC") {
        (Units::Metric, rest)
    } else if let Some(rest) = line.strip_prefix("INCH") {
        (Units::Inch, rest)
    } else if line == "M71" {
        (Units::Metric, "")
    } else if line == "M72" {
        (Units::Inch, "")
    } else {
        return false;
    };

    state.units = units;
    match units {
        Units::Metric => {
            state.integer_digits = 3;
            state.decimal_digits = 3;
        }
        Units::Inch => {
            state.integer_digits = 2;
            state.decimal_digits = 4;
        }
    }

    for part in rest.split(',') {
        let part = part.trim();
        match part {
            "" => {}
            "TZ" => state.suppression = ZeroSuppression::Trailing,
            "LZ" => state.suppression = ZeroSuppression::Leading,
            _ => {
                // Explicit digit format such as "000.000".
                if part.contains('.') && part.chars().all(|c| c == '0' || c == '.') {
                    if let Some(dot) = part.find('.') {
                        let integer = dot as u8;
                        let decimal = (part.len() - dot - 1) as u8;
                        if integer > 0 && decimal > 0 {
                            state.integer_digits = integer;
                            state.decimal_digits = decimal;
                        }
                    }
                }
            }
        }
    }

    true
}

fn register_tool(state: &mut ParserState, builder: &mut MeshBuilder, tool: u32, diameter: f64) {
    let diameter_mm = match state.units {
        Units::Metric => diameter,
        Units::Inch => diameter * 25.4,
    };
    if diameter_mm <= 0.0 {
        builder.warn(format!(
            "tool T{tool} has zero or negative diameter; skipping definition"
        ));
        return;
    }
    if state.tools.insert(tool, diameter_mm).is_some() {
        builder.warn(format!(
            "duplicate definition for tool T{tool}; last definition wins"
        ));
    }
}

/// `T01C0.300` → (1, 0.3). Selections (no `C` field) return `None`.
fn split_tool_definition(line: &str) -> Option<(u32, f64)> {
    let rest = line.strip_prefix('T')?;
    let (tool_raw, after_c) = rest.split_once('C')?;
    if tool_raw.is_empty() || !tool_raw.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    // Feed/speed options may trail the diameter (e.g. T1C0.3F200S65).
    let diameter_raw: String = after_c
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let tool = tool_raw.parse().ok()?;
    let diameter = diameter_raw.parse().ok()?;
    Some((tool, diameter))
}

fn parse_tool_selection(line: &str) -> Option<u32> {
    let rest = line.strip_prefix('T')?;
    if rest.is_empty() || rest.contains('C') {
        return None;
    }
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn parse_coordinate_line(
    line: &str,
    state: &ParserState,
    builder: &mut MeshBuilder,
) -> Option<(f64, f64)> {
    let mut x: Option<f64> = None;
    let mut y: Option<f64> = None;

    let mut rest = line;
    while let Some(axis) = rest.chars().next() {
        if axis != 'X' && axis != 'Y' {
            // Trailing fields we do not understand; stop at the first one.
            break;
        }
        let after = &rest[1..];
        let end = after
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(after.len());
        let field = &after[..end];
        let Some(value) = parse_coordinate_value(field, state) else {
            builder.warn(format!("malformed coordinate `{line}`; skipping"));
            return None;
        };
        if axis == 'X' {
            x = Some(value);
        } else {
            y = Some(value);
        }
        rest = &after[end..];
    }

    match (x, y) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => {
            builder.warn(format!(
                "drill coordinate `{line}` is missing an axis; skipping"
            ));
            None
        }
    }
}

fn parse_coordinate_value(raw: &str, state: &ParserState) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }

    let value = if raw.contains('.') {
        raw.parse::<f64>().ok()?
    } else {
        let (sign, digits) = match raw.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, raw.strip_prefix('+').unwrap_or(raw)),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let total = usize::from(state.integer_digits) + usize::from(state.decimal_digits);
        if digits.len() <= usize::from(state.integer_digits) {
            // Bare integer coordinates (X5Y10) pass through unscaled.
            sign * digits.parse::<f64>().ok()?
        } else {
            let padded = if digits.len() < total {
                match state.suppression {
                    ZeroSuppression::Leading => format!("{digits:0>total$}"),
                    ZeroSuppression::Trailing => format!("{digits:0<total$}"),
                }
            } else {
                digits.to_string()
            };
            let scale = 10f64.powi(i32::from(state.decimal_digits));
            sign * padded.parse::<f64>().ok()? / scale
        }
    };

    Some(match state.units {
        Units::Metric => value,
        Units::Inch => value * 25.4,
    })
}

fn is_routing_command(line: &str) -> bool {
    line.starts_with("G00")
        || line.starts_with("G01")
        || line.starts_with("G02")
        || line.starts_with("G03")
        || line.starts_with("G85")
}
