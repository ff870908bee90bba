//! Aperture macro templates and evaluation.
//!
//! `%AM` bodies parse into primitives and `$n = expr` variable definitions.
//! Field expressions compile to postfix programs that are evaluated with a
//! stack at flash time, with the actual parameters bound to `$1..$n`.

use std::collections::HashMap;

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::geometry::aperture::{self, normalize_dimension};
use crate::geometry::region;
use crate::geometry::stroke;
use crate::types::{Aperture, Point};

const MAX_EXPR_DEPTH: usize = 20;

/// A compiled arithmetic expression in postfix form.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    ops: Vec<ExprOp>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExprOp {
    Literal(f64),
    Param(u32),
    Add,
    Sub,
    Mul,
    Div,
    Neg,
}

impl Expr {
    /// Evaluate against the parameter environment.
    ///
    /// Division by zero evaluates to 0 with a warning. Exceeding the depth
    /// cap warns and returns `None`, which aborts the enclosing primitive.
    fn eval(
        &self,
        params: &[f64],
        vars: &HashMap<u32, f64>,
        builder: &mut MeshBuilder,
    ) -> Option<f64> {
        let mut stack: Vec<f64> = Vec::with_capacity(8);
        for op in &self.ops {
            match op {
                ExprOp::Literal(v) => stack.push(*v),
                ExprOp::Param(n) => stack.push(lookup(*n, params, vars, builder)),
                ExprOp::Neg => {
                    let a = stack.pop()?;
                    stack.push(-a);
                }
                ExprOp::Add => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(a + b);
                }
                ExprOp::Sub => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(a - b);
                }
                ExprOp::Mul => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    stack.push(a * b);
                }
                ExprOp::Div => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    if b.abs() < f64::EPSILON {
                        builder
                            .warn("division by zero in macro expression; evaluating to 0".to_string());
                        stack.push(0.0);
                    } else {
                        stack.push(a / b);
                    }
                }
            }
            if stack.len() > MAX_EXPR_DEPTH {
                builder.warn(
                    "macro expression exceeds the depth limit of 20; aborting primitive"
                        .to_string(),
                );
                return None;
            }
        }
        stack.pop()
    }
}

fn lookup(n: u32, params: &[f64], vars: &HashMap<u32, f64>, builder: &mut MeshBuilder) -> f64 {
    if let Some(v) = vars.get(&n) {
        return *v;
    }
    let idx = n as usize;
    if idx >= 1 && idx <= params.len() {
        return params[idx - 1];
    }
    builder.warn(format!("undefined macro variable ${n}; using 0"));
    0.0
}

/// One entry of a macro template body.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroContent {
    /// `$n = expr`
    Variable { number: u32, expr: Expr },
    /// Code 1
    Circle {
        exposure: Expr,
        diameter: Expr,
        center_x: Expr,
        center_y: Expr,
        rotation: Option<Expr>,
    },
    /// Code 20 (or legacy 2)
    VectorLine {
        exposure: Expr,
        width: Expr,
        start_x: Expr,
        start_y: Expr,
        end_x: Expr,
        end_y: Expr,
        rotation: Expr,
    },
    /// Code 21
    CenterLine {
        exposure: Expr,
        width: Expr,
        height: Expr,
        center_x: Expr,
        center_y: Expr,
        rotation: Expr,
    },
    /// Code 4. `coords` holds the (n+1) coordinate pairs followed by the
    /// rotation; the split happens at evaluation once `vertex_count` is known.
    Outline {
        exposure: Expr,
        vertex_count: Expr,
        coords: Vec<Expr>,
    },
    /// Code 5
    Polygon {
        exposure: Expr,
        vertex_count: Expr,
        center_x: Expr,
        center_y: Expr,
        diameter: Expr,
        rotation: Expr,
    },
}

/// A named aperture macro template.
#[derive(Debug, Clone)]
pub struct MacroDef {
    pub name: String,
    pub content: Vec<MacroContent>,
}

/// Parse the body lines of an %AM block.
///
/// Unparseable or unsupported lines are skipped and reported in the returned
/// warnings; the rest of the template survives.
pub fn parse_macro_body(name: &str, lines: &[String]) -> (Vec<MacroContent>, Vec<String>) {
    let mut content = Vec::new();
    let mut warnings = Vec::new();

    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "0" || trimmed.starts_with("0 ") {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('$') {
            match parse_variable_definition(rest) {
                Ok(entry) => content.push(entry),
                Err(err) => warnings.push(format!(
                    "macro `{name}`: {err}; skipping line `{trimmed}`"
                )),
            }
            continue;
        }

        match parse_primitive(trimmed) {
            Ok(Some(entry)) => content.push(entry),
            Ok(None) => warnings.push(format!(
                "macro `{name}`: unsupported primitive `{trimmed}`; skipping"
            )),
            Err(err) => warnings.push(format!(
                "macro `{name}`: {err}; skipping line `{trimmed}`"
            )),
        }
    }

    (content, warnings)
}

fn parse_variable_definition(rest: &str) -> Result<MacroContent, GeometryError> {
    let (number_str, expr_str) = rest.split_once('=').ok_or_else(|| {
        GeometryError::MalformedCommand("variable definition missing '='".to_string())
    })?;
    let number: u32 = number_str.trim().parse().map_err(|_| {
        GeometryError::MalformedCommand(format!("variable number `${number_str}`"))
    })?;
    let expr = parse_expr(expr_str)?;
    Ok(MacroContent::Variable { number, expr })
}

fn parse_primitive(line: &str) -> Result<Option<MacroContent>, GeometryError> {
    let parts: Vec<&str> = line.split(',').collect();
    let code: u32 = parts[0]
        .trim()
        .parse()
        .map_err(|_| GeometryError::MalformedCommand(format!("primitive code `{}`", parts[0])))?;

    let exprs: Vec<Expr> = parts[1..]
        .iter()
        .map(|p| parse_expr(p))
        .collect::<Result<Vec<_>, _>>()?;

    let need = |count: usize| {
        if exprs.len() < count {
            Err(GeometryError::MalformedCommand(format!(
                "primitive {code} needs {count} fields, got {}",
                exprs.len()
            )))
        } else {
            Ok(())
        }
    };

    let entry = match code {
        1 => {
            need(4)?;
            MacroContent::Circle {
                exposure: exprs[0].clone(),
                diameter: exprs[1].clone(),
                center_x: exprs[2].clone(),
                center_y: exprs[3].clone(),
                rotation: exprs.get(4).cloned(),
            }
        }
        2 | 20 => {
            need(7)?;
            MacroContent::VectorLine {
                exposure: exprs[0].clone(),
                width: exprs[1].clone(),
                start_x: exprs[2].clone(),
                start_y: exprs[3].clone(),
                end_x: exprs[4].clone(),
                end_y: exprs[5].clone(),
                rotation: exprs[6].clone(),
            }
        }
        21 => {
            need(6)?;
            MacroContent::CenterLine {
                exposure: exprs[0].clone(),
                width: exprs[1].clone(),
                height: exprs[2].clone(),
                center_x: exprs[3].clone(),
                center_y: exprs[4].clone(),
                rotation: exprs[5].clone(),
            }
        }
        4 => {
            need(2)?;
            MacroContent::Outline {
                exposure: exprs[0].clone(),
                vertex_count: exprs[1].clone(),
                coords: exprs[2..].to_vec(),
            }
        }
        5 => {
            need(6)?;
            MacroContent::Polygon {
                exposure: exprs[0].clone(),
                vertex_count: exprs[1].clone(),
                center_x: exprs[2].clone(),
                center_y: exprs[3].clone(),
                diameter: exprs[4].clone(),
                rotation: exprs[5].clone(),
            }
        }
        // Moire (6) and thermal (7) are out of scope.
        _ => return Ok(None),
    };

    Ok(Some(entry))
}

/// Evaluate a macro template at a flash position.
///
/// A primitive whose exposure evaluates to 0 has its triangles wrapped in a
/// clear range. Primitive failures warn and abort only that primitive.
/// `unit_scale` brings the template's linear quantities to millimetres
/// (25.4 for inch files); angles and counts are unscaled.
pub fn evaluate(
    builder: &mut MeshBuilder,
    def: &MacroDef,
    params: &[f64],
    position: Point,
    unit_scale: f64,
) -> Result<(), GeometryError> {
    let mut vars: HashMap<u32, f64> = HashMap::new();

    for content in &def.content {
        match content {
            MacroContent::Variable { number, expr } => {
                if let Some(value) = expr.eval(params, &vars, builder) {
                    vars.insert(*number, value);
                }
            }
            MacroContent::Circle {
                exposure,
                diameter,
                center_x,
                center_y,
                rotation,
            } => {
                let Some(exp) = exposure.eval(params, &vars, builder) else {
                    continue;
                };
                let Some(d) = diameter.eval(params, &vars, builder) else {
                    continue;
                };
                let Some(cx) = center_x.eval(params, &vars, builder) else {
                    continue;
                };
                let Some(cy) = center_y.eval(params, &vars, builder) else {
                    continue;
                };
                let rot = match rotation {
                    Some(expr) => match expr.eval(params, &vars, builder) {
                        Some(v) => v,
                        None => continue,
                    },
                    None => 0.0,
                };

                with_exposure(builder, exp, |builder| {
                    let (rx, ry) = rotate_point(cx * unit_scale, cy * unit_scale, rot);
                    demote(
                        builder,
                        |builder| {
                            aperture::flash(
                                builder,
                                &Aperture::Circle {
                                    diameter: d * unit_scale,
                                },
                                Point::new(position.x + rx, position.y + ry),
                            )
                        },
                    );
                });
            }
            MacroContent::VectorLine {
                exposure,
                width,
                start_x,
                start_y,
                end_x,
                end_y,
                rotation,
            } => {
                let fields = [exposure, width, start_x, start_y, end_x, end_y, rotation];
                let Some(v) = eval_all(&fields, params, &vars, builder) else {
                    continue;
                };
                let (exp, w, sx, sy, ex, ey, rot) = (v[0], v[1], v[2], v[3], v[4], v[5], v[6]);

                with_exposure(builder, exp, |builder| {
                    let (rsx, rsy) = rotate_point(sx * unit_scale, sy * unit_scale, rot);
                    let (rex, rey) = rotate_point(ex * unit_scale, ey * unit_scale, rot);
                    demote(builder, |builder| {
                        stroke::draw_linear(
                            builder,
                            Point::new(position.x + rsx, position.y + rsy),
                            Point::new(position.x + rex, position.y + rey),
                            &Aperture::Circle {
                                diameter: w * unit_scale,
                            },
                        )
                    });
                });
            }
            MacroContent::CenterLine {
                exposure,
                width,
                height,
                center_x,
                center_y,
                rotation,
            } => {
                let fields = [exposure, width, height, center_x, center_y, rotation];
                let Some(v) = eval_all(&fields, params, &vars, builder) else {
                    continue;
                };
                let (exp, w, h, cx, cy, rot) = (v[0], v[1], v[2], v[3], v[4], v[5]);

                let w = match checked_dimension(builder, w * unit_scale, "center line width") {
                    Some(value) => value,
                    None => continue,
                };
                let h = match checked_dimension(builder, h * unit_scale, "center line height") {
                    Some(value) => value,
                    None => continue,
                };

                with_exposure(builder, exp, |builder| {
                    push_rotated_rect(
                        builder,
                        position,
                        cx * unit_scale,
                        cy * unit_scale,
                        w,
                        h,
                        rot,
                    );
                });
            }
            MacroContent::Outline {
                exposure,
                vertex_count,
                coords,
            } => {
                let Some(exp) = exposure.eval(params, &vars, builder) else {
                    continue;
                };
                let Some(count) = vertex_count.eval(params, &vars, builder) else {
                    continue;
                };
                if count < 1.0 {
                    builder.warn("outline primitive with no vertices; skipping".to_string());
                    continue;
                }
                let n = count as usize;
                let coord_count = (n + 1) * 2;
                if coords.len() < coord_count + 1 {
                    builder.warn(format!(
                        "outline primitive declares {n} vertices but carries {} fields; skipping",
                        coords.len()
                    ));
                    continue;
                }

                let Some(rot) = coords[coord_count].eval(params, &vars, builder) else {
                    continue;
                };
                let mut boundary = Vec::with_capacity(n + 1);
                let mut aborted = false;
                for k in 0..=n {
                    let x = coords[k * 2].eval(params, &vars, builder);
                    let y = coords[k * 2 + 1].eval(params, &vars, builder);
                    let (Some(x), Some(y)) = (x, y) else {
                        aborted = true;
                        break;
                    };
                    let (rx, ry) = rotate_point(x * unit_scale, y * unit_scale, rot);
                    boundary.push(Point::new(position.x + rx, position.y + ry));
                }
                if aborted {
                    continue;
                }

                with_exposure(builder, exp, |builder| {
                    demote(builder, |builder| region::fill_region(builder, &boundary));
                });
            }
            MacroContent::Polygon {
                exposure,
                vertex_count,
                center_x,
                center_y,
                diameter,
                rotation,
            } => {
                let fields = [exposure, vertex_count, center_x, center_y, diameter, rotation];
                let Some(v) = eval_all(&fields, params, &vars, builder) else {
                    continue;
                };
                let (exp, count, cx, cy, d, rot) = (v[0], v[1], v[2], v[3], v[4], v[5]);

                with_exposure(builder, exp, |builder| {
                    let (rx, ry) = rotate_point(cx * unit_scale, cy * unit_scale, rot);
                    demote(builder, |builder| {
                        aperture::flash(
                            builder,
                            &Aperture::Polygon {
                                diameter: d * unit_scale,
                                vertices: count.max(0.0) as u32,
                                rotation: rot,
                            },
                            Point::new(position.x + rx, position.y + ry),
                        )
                    });
                });
            }
        }
    }

    Ok(())
}

fn eval_all(
    fields: &[&Expr],
    params: &[f64],
    vars: &HashMap<u32, f64>,
    builder: &mut MeshBuilder,
) -> Option<Vec<f64>> {
    let mut values = Vec::with_capacity(fields.len());
    for field in fields {
        values.push(field.eval(params, vars, builder)?);
    }
    Some(values)
}

/// Run `emit`, wrapping its output in a clear range when exposure is off.
fn with_exposure<F>(builder: &mut MeshBuilder, exposure: f64, emit: F)
where
    F: FnOnce(&mut MeshBuilder),
{
    let clear = exposure.abs() < 0.5;
    if clear {
        builder.open_clear_range();
    }
    emit(builder);
    if clear {
        builder.close_clear_range();
    }
}

fn demote<F>(builder: &mut MeshBuilder, emit: F)
where
    F: FnOnce(&mut MeshBuilder) -> Result<(), GeometryError>,
{
    if let Err(err) = emit(builder) {
        builder.warn(err.to_string());
    }
}

fn checked_dimension(builder: &mut MeshBuilder, value: f64, label: &str) -> Option<f64> {
    match normalize_dimension(builder, value, label) {
        Ok(Some(v)) => Some(v),
        Ok(None) => None,
        Err(err) => {
            builder.warn(err.to_string());
            None
        }
    }
}

fn push_rotated_rect(
    builder: &mut MeshBuilder,
    position: Point,
    cx: f64,
    cy: f64,
    width: f64,
    height: f64,
    rotation: f64,
) {
    let hw = width / 2.0;
    let hh = height / 2.0;
    let corners = [
        (cx - hw, cy - hh),
        (cx + hw, cy - hh),
        (cx + hw, cy + hh),
        (cx - hw, cy + hh),
    ];
    let mut ids = [0u32; 4];
    for (slot, (x, y)) in corners.iter().enumerate() {
        let (rx, ry) = rotate_point(*x, *y, rotation);
        match builder.push_vertex(position.x + rx, position.y + ry) {
            Some(id) => ids[slot] = id,
            None => return,
        }
    }
    builder.push_quad(ids[0], ids[1], ids[2], ids[3]);
}

/// Rotate a point about the macro origin by an angle in degrees.
fn rotate_point(x: f64, y: f64, angle_deg: f64) -> (f64, f64) {
    if angle_deg.abs() < 1e-12 {
        return (x, y);
    }
    let rad = angle_deg.to_radians();
    let (sin, cos) = rad.sin_cos();
    (x.mul_add(cos, -(y * sin)), x.mul_add(sin, y * cos))
}

// ─── Expression parsing ─────────────────────────────────────────────

/// Parse an arithmetic expression into a postfix program.
///
/// Gerber uses `x`/`X` for multiplication (`*` terminates statements).
pub fn parse_expr(input: &str) -> Result<Expr, GeometryError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Expr {
            ops: vec![ExprOp::Literal(0.0)],
        });
    }
    let tokens = tokenize_expr(trimmed)?;
    to_postfix(&tokens, trimmed)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ExprToken {
    Num(f64),
    Var(u32),
    Plus,
    Minus,
    Mul,
    Div,
    LParen,
    RParen,
}

fn tokenize_expr(s: &str) -> Result<Vec<ExprToken>, GeometryError> {
    let mut tokens = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(ExprToken::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(ExprToken::Minus);
            }
            'x' | 'X' => {
                chars.next();
                tokens.push(ExprToken::Mul);
            }
            '/' => {
                chars.next();
                tokens.push(ExprToken::Div);
            }
            '(' => {
                chars.next();
                tokens.push(ExprToken::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(ExprToken::RParen);
            }
            '$' => {
                chars.next();
                let mut digits = String::new();
                while chars.peek().is_some_and(char::is_ascii_digit) {
                    if let Some(d) = chars.next() {
                        digits.push(d);
                    }
                }
                let n: u32 = digits.parse().map_err(|_| {
                    GeometryError::ArithmeticError(format!("bad variable reference in `{s}`"))
                })?;
                tokens.push(ExprToken::Var(n));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut digits = String::new();
                while chars
                    .peek()
                    .is_some_and(|c| c.is_ascii_digit() || *c == '.')
                {
                    if let Some(d) = chars.next() {
                        digits.push(d);
                    }
                }
                let value: f64 = digits.parse().map_err(|_| {
                    GeometryError::ArithmeticError(format!("bad number `{digits}` in `{s}`"))
                })?;
                tokens.push(ExprToken::Num(value));
            }
            other => {
                return Err(GeometryError::ArithmeticError(format!(
                    "unexpected character '{other}' in expression `{s}`"
                )));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PendingOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    LParen,
}

fn precedence(op: PendingOp) -> u8 {
    match op {
        PendingOp::LParen => 0,
        PendingOp::Add | PendingOp::Sub => 1,
        PendingOp::Mul | PendingOp::Div => 2,
        PendingOp::Neg => 3,
    }
}

fn emit(op: PendingOp, output: &mut Vec<ExprOp>) {
    output.push(match op {
        PendingOp::Add => ExprOp::Add,
        PendingOp::Sub => ExprOp::Sub,
        PendingOp::Mul => ExprOp::Mul,
        PendingOp::Div => ExprOp::Div,
        PendingOp::Neg => ExprOp::Neg,
        PendingOp::LParen => return,
    });
}

/// Shunting-yard conversion to postfix. Parenthesis nesting beyond the depth
/// cap is rejected here, at definition time.
fn to_postfix(tokens: &[ExprToken], source: &str) -> Result<Expr, GeometryError> {
    let mut output: Vec<ExprOp> = Vec::with_capacity(tokens.len());
    let mut stack: Vec<PendingOp> = Vec::new();
    let mut depth = 0usize;
    let mut value_before = false;

    for token in tokens {
        match token {
            ExprToken::Num(v) => {
                output.push(ExprOp::Literal(*v));
                value_before = true;
            }
            ExprToken::Var(n) => {
                output.push(ExprOp::Param(*n));
                value_before = true;
            }
            ExprToken::LParen => {
                depth += 1;
                if depth > MAX_EXPR_DEPTH {
                    return Err(GeometryError::ArithmeticError(format!(
                        "expression nesting exceeds {MAX_EXPR_DEPTH} levels in `{source}`"
                    )));
                }
                stack.push(PendingOp::LParen);
                value_before = false;
            }
            ExprToken::RParen => {
                loop {
                    match stack.pop() {
                        Some(PendingOp::LParen) => break,
                        Some(op) => emit(op, &mut output),
                        None => {
                            return Err(GeometryError::ArithmeticError(format!(
                                "unmatched ')' in `{source}`"
                            )));
                        }
                    }
                }
                depth = depth.saturating_sub(1);
                value_before = true;
            }
            ExprToken::Plus | ExprToken::Minus | ExprToken::Mul | ExprToken::Div => {
                let op = match token {
                    ExprToken::Plus if !value_before => continue,
                    ExprToken::Minus if !value_before => PendingOp::Neg,
                    ExprToken::Plus => PendingOp::Add,
                    ExprToken::Minus => PendingOp::Sub,
                    ExprToken::Mul => PendingOp::Mul,
                    _ => PendingOp::Div,
                };
                while let Some(&top) = stack.last() {
                    if top == PendingOp::LParen {
                        break;
                    }
                    // Unary minus binds right; the binary operators bind left.
                    let pop = if op == PendingOp::Neg {
                        precedence(top) > precedence(op)
                    } else {
                        precedence(top) >= precedence(op)
                    };
                    if !pop {
                        break;
                    }
                    stack.pop();
                    emit(top, &mut output);
                }
                stack.push(op);
                value_before = false;
            }
        }
    }

    while let Some(op) = stack.pop() {
        if op == PendingOp::LParen {
            return Err(GeometryError::ArithmeticError(format!(
                "unmatched '(' in `{source}`"
            )));
        }
        emit(op, &mut output);
    }

    if output.is_empty() {
        return Err(GeometryError::ArithmeticError(format!(
            "empty expression `{source}`"
        )));
    }

    Ok(Expr { ops: output })
}
