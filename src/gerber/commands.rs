use crate::error::GeometryError;
use crate::types::Aperture;

use super::coord::{CoordinateFormat, RawCoord, Units, ZeroSuppression};
use super::lexer::GerberToken;

/// Layer polarity from the %LP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Dark,
    Clear,
}

/// A fully parsed Gerber command.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberCommand {
    /// %FS - coordinate format specification
    FormatSpec(CoordinateFormat),
    /// %MO - unit mode
    Units(Units),
    /// %AD - aperture definition
    ApertureDefine { code: u32, aperture: Aperture },
    /// %AM - aperture macro definition; body lines are primitive descriptors
    MacroDefine { name: String, body: Vec<String> },
    /// Dnn (n >= 10) - select aperture
    SelectAperture(u32),
    /// D01 - interpolate (draw)
    Interpolate {
        x: Option<RawCoord>,
        y: Option<RawCoord>,
        i: Option<RawCoord>,
        j: Option<RawCoord>,
    },
    /// D02 - move
    Move {
        x: Option<RawCoord>,
        y: Option<RawCoord>,
    },
    /// D03 - flash
    Flash {
        x: Option<RawCoord>,
        y: Option<RawCoord>,
    },
    /// G01
    LinearMode,
    /// G02
    ClockwiseArcMode,
    /// G03
    CounterClockwiseArcMode,
    /// G36
    RegionBegin,
    /// G37
    RegionEnd,
    /// G74 - deprecated single-quadrant arc mode
    SingleQuadrant,
    /// G75
    MultiQuadrant,
    /// %LP
    Polarity(Polarity),
    /// %SR with parameters - opens a step-repeat block
    StepRepeatBegin {
        x_repeat: u32,
        y_repeat: u32,
        x_step: f64,
        y_step: f64,
    },
    /// Bare %SR - closes the current step-repeat block
    StepRepeatEnd,
    /// A recognised-but-unsupported or unknown extended directive
    Unsupported(String),
    /// M02
    EndOfFile,
}

/// Parse a token stream into commands.
///
/// Malformed commands are skipped and reported in the returned warning list;
/// the stream always parses to completion.
pub fn parse_commands(tokens: &[GerberToken]) -> (Vec<GerberCommand>, Vec<String>) {
    let mut commands = Vec::new();
    let mut warnings = Vec::new();
    let mut macro_name: Option<String> = None;
    let mut macro_body: Vec<String> = Vec::new();

    for token in tokens {
        match token {
            GerberToken::Extended(content) => {
                // %AM opens a macro definition; its body arrives as the
                // following extended tokens until a non-body token.
                if let Some(name) = content.strip_prefix("AM") {
                    if !name.is_empty() {
                        flush_macro(&mut commands, &mut macro_name, &mut macro_body);
                        macro_name = Some(name.trim().to_string());
                        continue;
                    }
                }

                if macro_name.is_some() {
                    let trimmed = content.trim();
                    if trimmed.starts_with(|c: char| c.is_ascii_digit()) || trimmed.starts_with('$')
                    {
                        macro_body.push(trimmed.to_string());
                        continue;
                    }
                    flush_macro(&mut commands, &mut macro_name, &mut macro_body);
                }

                match parse_extended(content, &mut warnings) {
                    Ok(Some(cmd)) => commands.push(cmd),
                    Ok(None) => {}
                    Err(err) => warnings.push(format!("{err}; skipping command")),
                }
            }
            GerberToken::Word(word) => {
                flush_macro(&mut commands, &mut macro_name, &mut macro_body);
                match parse_word(word) {
                    Ok(cmds) => commands.extend(cmds),
                    Err(err) => warnings.push(format!("{err}; skipping command")),
                }
            }
        }
    }

    flush_macro(&mut commands, &mut macro_name, &mut macro_body);
    (commands, warnings)
}

fn flush_macro(
    commands: &mut Vec<GerberCommand>,
    macro_name: &mut Option<String>,
    macro_body: &mut Vec<String>,
) {
    if let Some(name) = macro_name.take() {
        commands.push(GerberCommand::MacroDefine {
            name,
            body: std::mem::take(macro_body),
        });
    }
}

/// Parse one extended command (content between % delimiters).
fn parse_extended(
    content: &str,
    warnings: &mut Vec<String>,
) -> Result<Option<GerberCommand>, GeometryError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();

    if compact.starts_with("FS") {
        return parse_format_spec(&compact, warnings).map(Some);
    }
    if compact == "MOMM" {
        return Ok(Some(GerberCommand::Units(Units::Millimeters)));
    }
    if compact == "MOIN" {
        return Ok(Some(GerberCommand::Units(Units::Inches)));
    }
    if compact.starts_with("AD") {
        return parse_aperture_define(&compact).map(Some);
    }
    if compact == "LPD" {
        return Ok(Some(GerberCommand::Polarity(Polarity::Dark)));
    }
    if compact == "LPC" {
        return Ok(Some(GerberCommand::Polarity(Polarity::Clear)));
    }
    if compact.starts_with("SR") {
        return parse_step_repeat(&compact).map(Some);
    }

    // Everything else, including the deprecated image-transform directives
    // (IP, IR, MI, OF, SF, LN, AS), is surfaced for the interpreter to warn
    // about and skip.
    Ok(Some(GerberCommand::Unsupported(compact)))
}

/// Parse a %FS command. Example: `FSLAX24Y24`.
fn parse_format_spec(
    content: &str,
    warnings: &mut Vec<String>,
) -> Result<GerberCommand, GeometryError> {
    let s = &content[2..];
    let x_pos = s
        .find('X')
        .ok_or_else(|| GeometryError::MalformedCommand(format!("FS missing X in `{content}`")))?;
    let y_pos = s
        .find('Y')
        .ok_or_else(|| GeometryError::MalformedCommand(format!("FS missing Y in `{content}`")))?;
    if y_pos < x_pos {
        return Err(GeometryError::MalformedCommand(format!(
            "FS axes out of order in `{content}`"
        )));
    }

    let mut suppression = ZeroSuppression::Leading;
    for flag in s[..x_pos].chars() {
        match flag {
            'L' => suppression = ZeroSuppression::Leading,
            'T' => {
                suppression = ZeroSuppression::Trailing;
                warnings.push(
                    "trailing-zero suppression (%FST) is deprecated; coordinates will be left-aligned"
                        .to_string(),
                );
            }
            'A' => {}
            'I' => warnings.push(
                "incremental coordinate notation (%FS..I) is not supported; treating as absolute"
                    .to_string(),
            ),
            other => warnings.push(format!("unrecognised format flag '{other}' in %FS")),
        }
    }

    let (x_integer, x_decimal) = parse_format_digits(&s[x_pos + 1..y_pos], content)?;
    let (y_integer, y_decimal) = parse_format_digits(&s[y_pos + 1..], content)?;

    Ok(GerberCommand::FormatSpec(CoordinateFormat {
        x_integer,
        x_decimal,
        y_integer,
        y_decimal,
        suppression,
    }))
}

fn parse_format_digits(part: &str, content: &str) -> Result<(u8, u8), GeometryError> {
    if part.len() != 2 {
        return Err(GeometryError::MalformedCommand(format!(
            "FS digit pair `{part}` in `{content}`"
        )));
    }
    let mut chars = part.chars();
    let integer = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| GeometryError::MalformedCommand(format!("FS digits in `{content}`")))?;
    let decimal = chars
        .next()
        .and_then(|c| c.to_digit(10))
        .ok_or_else(|| GeometryError::MalformedCommand(format!("FS digits in `{content}`")))?;
    if integer > 6 || decimal > 6 {
        return Err(GeometryError::MalformedCommand(format!(
            "FS supports at most 6.6 digits, got `{part}` in `{content}`"
        )));
    }
    Ok((integer as u8, decimal as u8))
}

/// Parse a %AD command. Example: `ADD10C,0.020` or `ADD11R,0.040X0.020`.
fn parse_aperture_define(content: &str) -> Result<GerberCommand, GeometryError> {
    let s = &content[2..];
    let s = s.strip_prefix('D').ok_or_else(|| {
        GeometryError::MalformedCommand(format!("AD expects D<code>, got `{content}`"))
    })?;

    let type_pos = s.find(|c: char| c.is_ascii_alphabetic()).ok_or_else(|| {
        GeometryError::MalformedCommand(format!("AD missing template in `{content}`"))
    })?;

    let code: u32 = s[..type_pos].parse().map_err(|_| {
        GeometryError::MalformedCommand(format!("AD aperture code in `{content}`"))
    })?;
    if code < 10 {
        return Err(GeometryError::MalformedCommand(format!(
            "aperture code D{code} is reserved; codes start at D10"
        )));
    }

    let aperture = parse_aperture_template(&s[type_pos..])?;
    Ok(GerberCommand::ApertureDefine { code, aperture })
}

/// Parse an aperture template. Example: `C,0.020`, `R,0.040X0.020`, `OC8,0.1`.
fn parse_aperture_template(s: &str) -> Result<Aperture, GeometryError> {
    let (name, params_str) = match s.find(',') {
        Some(comma) => (&s[..comma], &s[comma + 1..]),
        None => (s, ""),
    };

    let params: Vec<f64> = if params_str.is_empty() {
        Vec::new()
    } else {
        params_str
            .split('X')
            .map(|p| {
                p.parse::<f64>().map_err(|_| {
                    GeometryError::MalformedCommand(format!("aperture parameter `{p}`"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    match name {
        "C" => {
            let diameter = params.first().copied().ok_or_else(|| {
                GeometryError::MalformedCommand("circle aperture missing diameter".to_string())
            })?;
            Ok(Aperture::Circle { diameter })
        }
        "R" | "O" => {
            if params.len() < 2 {
                return Err(GeometryError::MalformedCommand(format!(
                    "{name} aperture needs width and height"
                )));
            }
            let (width, height) = (params[0], params[1]);
            if name == "R" {
                Ok(Aperture::Rectangle { width, height })
            } else {
                Ok(Aperture::Obround { width, height })
            }
        }
        "P" => {
            if params.len() < 2 {
                return Err(GeometryError::MalformedCommand(
                    "P aperture needs diameter and vertex count".to_string(),
                ));
            }
            Ok(Aperture::Polygon {
                diameter: params[0],
                vertices: params[1] as u32,
                rotation: params.get(2).copied().unwrap_or(0.0),
            })
        }
        _ => Ok(Aperture::Macro {
            name: name.to_string(),
            params,
        }),
    }
}

/// Parse a %SR command. Parameters open a block; a bare `SR` closes it.
fn parse_step_repeat(content: &str) -> Result<GerberCommand, GeometryError> {
    let s = &content[2..];
    if s.is_empty() {
        return Ok(GerberCommand::StepRepeatEnd);
    }
    let x_repeat = field_u32(s, 'X').unwrap_or(1);
    let y_repeat = field_u32(s, 'Y').unwrap_or(1);
    let x_step = field_f64(s, 'I').unwrap_or(0.0);
    let y_step = field_f64(s, 'J').unwrap_or(0.0);
    Ok(GerberCommand::StepRepeatBegin {
        x_repeat,
        y_repeat,
        x_step,
        y_step,
    })
}

fn field_str(s: &str, key: char) -> Option<&str> {
    let pos = s.find(key)?;
    let after = &s[pos + 1..];
    let end = after
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(after.len());
    Some(&after[..end])
}

fn field_u32(s: &str, key: char) -> Option<u32> {
    field_str(s, key)?.parse().ok()
}

fn field_f64(s: &str, key: char) -> Option<f64> {
    field_str(s, key)?.parse().ok()
}

/// Parse a word command such as `D10`, `X100Y200D01`, `G01`, or the compound
/// `G01X100Y200D01`.
fn parse_word(word: &str) -> Result<Vec<GerberCommand>, GeometryError> {
    let mut commands = Vec::new();
    let mut remaining = word;

    if remaining.starts_with('G') || remaining.starts_with('g') {
        let g_end = remaining[1..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(remaining.len(), |i| i + 1);
        if let Some(cmd) = parse_g_code(&remaining[..g_end]) {
            commands.push(cmd);
        }
        remaining = &remaining[g_end..];
        if remaining.is_empty() {
            return Ok(commands);
        }
    }

    if remaining.starts_with('M') || remaining.starts_with('m') {
        if matches!(remaining[1..].parse::<u32>(), Ok(2)) {
            commands.push(GerberCommand::EndOfFile);
        }
        return Ok(commands);
    }

    let mut x: Option<RawCoord> = None;
    let mut y: Option<RawCoord> = None;
    let mut i: Option<RawCoord> = None;
    let mut j: Option<RawCoord> = None;
    let mut d_code: Option<u32> = None;

    let bytes = remaining.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        let key = (bytes[pos] as char).to_ascii_uppercase();
        pos += 1;
        match key {
            'X' | 'Y' | 'I' | 'J' => {
                let start = pos;
                if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
                    pos += 1;
                }
                let digit_start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                let value: i64 = remaining[start..pos].parse().map_err(|_| {
                    GeometryError::MalformedCommand(format!("coordinate in `{word}`"))
                })?;
                let coord = RawCoord {
                    value,
                    digits: (pos - digit_start) as u8,
                };
                match key {
                    'X' => x = Some(coord),
                    'Y' => y = Some(coord),
                    'I' => i = Some(coord),
                    _ => j = Some(coord),
                }
            }
            'D' => {
                let start = pos;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
                d_code = Some(remaining[start..pos].parse().map_err(|_| {
                    GeometryError::MalformedCommand(format!("D-code in `{word}`"))
                })?);
            }
            _ => {
                return Err(GeometryError::MalformedCommand(format!(
                    "unexpected character '{key}' in `{word}`"
                )));
            }
        }
    }

    match d_code {
        Some(1) => commands.push(GerberCommand::Interpolate { x, y, i, j }),
        Some(2) => commands.push(GerberCommand::Move { x, y }),
        Some(3) => commands.push(GerberCommand::Flash { x, y }),
        Some(code) if code >= 10 => commands.push(GerberCommand::SelectAperture(code)),
        Some(code) => {
            return Err(GeometryError::MalformedCommand(format!(
                "D{code} is not a valid operation or aperture in `{word}`"
            )));
        }
        None => {
            // Bare coordinates: the previous operation code persists, which in
            // practice means D01.
            if x.is_some() || y.is_some() {
                commands.push(GerberCommand::Interpolate { x, y, i, j });
            }
        }
    }

    Ok(commands)
}

fn parse_g_code(s: &str) -> Option<GerberCommand> {
    let code: u32 = s.get(1..)?.parse().ok()?;
    match code {
        1 => Some(GerberCommand::LinearMode),
        2 => Some(GerberCommand::ClockwiseArcMode),
        3 => Some(GerberCommand::CounterClockwiseArcMode),
        36 => Some(GerberCommand::RegionBegin),
        37 => Some(GerberCommand::RegionEnd),
        74 => Some(GerberCommand::SingleQuadrant),
        75 => Some(GerberCommand::MultiQuadrant),
        // G54 (select prefix), G70/G71, G90/G91 and friends carry no
        // information we use.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gerber::lexer::tokenize;

    fn parse(input: &str) -> Vec<GerberCommand> {
        let tokens = tokenize(input).expect("tokenize should succeed");
        let (commands, warnings) = parse_commands(&tokens);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
        commands
    }

    fn parse_with_warnings(input: &str) -> (Vec<GerberCommand>, Vec<String>) {
        let tokens = tokenize(input).expect("tokenize should succeed");
        parse_commands(&tokens)
    }

    fn coord(value: i64, digits: u8) -> Option<RawCoord> {
        Some(RawCoord { value, digits })
    }

    #[test]
    fn format_spec() {
        let cmds = parse("%FSLAX24Y24*%\n");
        match &cmds[0] {
            GerberCommand::FormatSpec(fmt) => {
                assert_eq!(fmt.x_integer, 2);
                assert_eq!(fmt.x_decimal, 4);
                assert_eq!(fmt.y_integer, 2);
                assert_eq!(fmt.y_decimal, 4);
                assert_eq!(fmt.suppression, ZeroSuppression::Leading);
            }
            other => panic!("expected FormatSpec, got {other:?}"),
        }
    }

    #[test]
    fn format_spec_trailing_suppression_warns() {
        let (cmds, warnings) = parse_with_warnings("%FSTAX24Y24*%\n");
        match &cmds[0] {
            GerberCommand::FormatSpec(fmt) => {
                assert_eq!(fmt.suppression, ZeroSuppression::Trailing);
            }
            other => panic!("expected FormatSpec, got {other:?}"),
        }
        assert!(warnings.iter().any(|w| w.contains("trailing-zero")));
    }

    #[test]
    fn format_spec_incremental_warns_but_parses() {
        let (cmds, warnings) = parse_with_warnings("%FSLIX24Y24*%\n");
        assert!(matches!(cmds[0], GerberCommand::FormatSpec(_)));
        assert!(warnings.iter().any(|w| w.contains("incremental")));
    }

    #[test]
    fn format_spec_too_many_digits_is_malformed() {
        let (cmds, warnings) = parse_with_warnings("%FSLAX74Y74*%\n");
        assert!(cmds.is_empty());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn units() {
        assert_eq!(
            parse("%MOMM*%\n"),
            vec![GerberCommand::Units(Units::Millimeters)]
        );
        assert_eq!(
            parse("%MOIN*%\n"),
            vec![GerberCommand::Units(Units::Inches)]
        );
    }

    #[test]
    fn aperture_define_circle() {
        assert_eq!(
            parse("%ADD10C,0.020*%\n"),
            vec![GerberCommand::ApertureDefine {
                code: 10,
                aperture: Aperture::Circle { diameter: 0.020 },
            }]
        );
    }

    #[test]
    fn aperture_define_rectangle_and_obround() {
        assert_eq!(
            parse("%ADD11R,0.040X0.020*%\n"),
            vec![GerberCommand::ApertureDefine {
                code: 11,
                aperture: Aperture::Rectangle {
                    width: 0.040,
                    height: 0.020,
                },
            }]
        );
        assert_eq!(
            parse("%ADD12O,0.050X0.030*%\n"),
            vec![GerberCommand::ApertureDefine {
                code: 12,
                aperture: Aperture::Obround {
                    width: 0.050,
                    height: 0.030,
                },
            }]
        );
    }

    #[test]
    fn aperture_define_polygon() {
        assert_eq!(
            parse("%ADD13P,0.080X6X22.5*%\n"),
            vec![GerberCommand::ApertureDefine {
                code: 13,
                aperture: Aperture::Polygon {
                    diameter: 0.080,
                    vertices: 6,
                    rotation: 22.5,
                },
            }]
        );
    }

    #[test]
    fn aperture_define_macro_reference() {
        assert_eq!(
            parse("%ADD22OC8,0.1*%\n"),
            vec![GerberCommand::ApertureDefine {
                code: 22,
                aperture: Aperture::Macro {
                    name: "OC8".to_string(),
                    params: vec![0.1],
                },
            }]
        );
    }

    #[test]
    fn reserved_aperture_code_is_malformed() {
        let (cmds, warnings) = parse_with_warnings("%ADD05C,0.1*%\n");
        assert!(cmds.is_empty());
        assert!(warnings.iter().any(|w| w.contains("reserved")));
    }

    #[test]
    fn macro_define_single_primitive() {
        let cmds = parse("%AMOC8*5,1,8,0,0,1.08239X$1,22.5*%\n");
        assert_eq!(
            cmds,
            vec![GerberCommand::MacroDefine {
                name: "OC8".to_string(),
                body: vec!["5,1,8,0,0,1.08239X$1,22.5".to_string()],
            }]
        );
    }

    #[test]
    fn macro_define_multi_line() {
        let cmds = parse("%AMTEST*1,1,0.5,0,0*21,1,0.3,0.1,0,0,0*%\n");
        assert_eq!(
            cmds,
            vec![GerberCommand::MacroDefine {
                name: "TEST".to_string(),
                body: vec![
                    "1,1,0.5,0,0".to_string(),
                    "21,1,0.3,0.1,0,0,0".to_string(),
                ],
            }]
        );
    }

    #[test]
    fn macro_with_variable_definition_line() {
        let cmds = parse("%AMDONUT*$2=$1x0.75*1,1,$1,0,0*%\n");
        match &cmds[0] {
            GerberCommand::MacroDefine { name, body } => {
                assert_eq!(name, "DONUT");
                assert_eq!(body.len(), 2);
                assert_eq!(body[0], "$2=$1x0.75");
            }
            other => panic!("expected MacroDefine, got {other:?}"),
        }
    }

    #[test]
    fn draw_move_flash() {
        assert_eq!(
            parse("X100Y200D01*\n"),
            vec![GerberCommand::Interpolate {
                x: coord(100, 3),
                y: coord(200, 3),
                i: None,
                j: None,
            }]
        );
        assert_eq!(
            parse("X100Y200D02*\n"),
            vec![GerberCommand::Move {
                x: coord(100, 3),
                y: coord(200, 3),
            }]
        );
        assert_eq!(
            parse("X100Y200D03*\n"),
            vec![GerberCommand::Flash {
                x: coord(100, 3),
                y: coord(200, 3),
            }]
        );
    }

    #[test]
    fn negative_coordinates_track_digit_count() {
        assert_eq!(
            parse("X-100Y-2000D01*\n"),
            vec![GerberCommand::Interpolate {
                x: coord(-100, 3),
                y: coord(-2000, 4),
                i: None,
                j: None,
            }]
        );
    }

    #[test]
    fn arc_offsets() {
        assert_eq!(
            parse("X200Y100I50J-30D01*\n"),
            vec![GerberCommand::Interpolate {
                x: coord(200, 3),
                y: coord(100, 3),
                i: coord(50, 2),
                j: coord(-30, 2),
            }]
        );
    }

    #[test]
    fn modal_axes_may_be_missing() {
        assert_eq!(
            parse("X500D01*\n"),
            vec![GerberCommand::Interpolate {
                x: coord(500, 3),
                y: None,
                i: None,
                j: None,
            }]
        );
    }

    #[test]
    fn select_aperture_and_g_codes() {
        assert_eq!(parse("D10*\n"), vec![GerberCommand::SelectAperture(10)]);
        assert_eq!(parse("G01*\n"), vec![GerberCommand::LinearMode]);
        assert_eq!(parse("G02*\n"), vec![GerberCommand::ClockwiseArcMode]);
        assert_eq!(parse("G03*\n"), vec![GerberCommand::CounterClockwiseArcMode]);
        assert_eq!(parse("G36*\n"), vec![GerberCommand::RegionBegin]);
        assert_eq!(parse("G37*\n"), vec![GerberCommand::RegionEnd]);
        assert_eq!(parse("G74*\n"), vec![GerberCommand::SingleQuadrant]);
        assert_eq!(parse("G75*\n"), vec![GerberCommand::MultiQuadrant]);
    }

    #[test]
    fn compound_g_code_word() {
        assert_eq!(
            parse("G01X100Y200D01*\n"),
            vec![
                GerberCommand::LinearMode,
                GerberCommand::Interpolate {
                    x: coord(100, 3),
                    y: coord(200, 3),
                    i: None,
                    j: None,
                },
            ]
        );
    }

    #[test]
    fn bare_coordinates_are_treated_as_draw() {
        assert_eq!(
            parse("X100Y200*\n"),
            vec![GerberCommand::Interpolate {
                x: coord(100, 3),
                y: coord(200, 3),
                i: None,
                j: None,
            }]
        );
    }

    #[test]
    fn end_of_file() {
        assert_eq!(parse("M02*\n"), vec![GerberCommand::EndOfFile]);
        assert_eq!(parse("M2*\n"), vec![GerberCommand::EndOfFile]);
    }

    #[test]
    fn polarity() {
        assert_eq!(
            parse("%LPD*%\n"),
            vec![GerberCommand::Polarity(Polarity::Dark)]
        );
        assert_eq!(
            parse("%LPC*%\n"),
            vec![GerberCommand::Polarity(Polarity::Clear)]
        );
    }

    #[test]
    fn step_repeat() {
        assert_eq!(
            parse("%SRX3Y2I5.0J10.0*%\n"),
            vec![GerberCommand::StepRepeatBegin {
                x_repeat: 3,
                y_repeat: 2,
                x_step: 5.0,
                y_step: 10.0,
            }]
        );
        assert_eq!(parse("%SR*%\n"), vec![GerberCommand::StepRepeatEnd]);
    }

    #[test]
    fn deprecated_directives_surface_as_unsupported() {
        assert_eq!(
            parse("%IPPOS*%\n"),
            vec![GerberCommand::Unsupported("IPPOS".to_string())]
        );
        assert_eq!(
            parse("%MIA1B0*%\n"),
            vec![GerberCommand::Unsupported("MIA1B0".to_string())]
        );
        assert_eq!(
            parse("%SFA2.0B1.5*%\n"),
            vec![GerberCommand::Unsupported("SFA2.0B1.5".to_string())]
        );
    }

    #[test]
    fn malformed_command_warns_and_stream_continues() {
        let (cmds, warnings) = parse_with_warnings("%ADD10C*%\nD10*\n");
        assert_eq!(cmds, vec![GerberCommand::SelectAperture(10)]);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing diameter"));
    }

    #[test]
    fn unknown_g_codes_are_skipped_silently() {
        assert!(parse("G90*\nG70*\n").is_empty());
        assert_eq!(parse("G54D10*\n"), vec![GerberCommand::SelectAperture(10)]);
    }
}
