use std::collections::HashMap;

use log::warn;

use crate::builder::MeshBuilder;
use crate::error::GeometryError;
use crate::geometry::arc::{self, ArcDirection};
use crate::geometry::{aperture, region, step_repeat, stroke};
use crate::types::{Aperture, LayerMesh, Point};

use super::commands::{GerberCommand, Polarity};
use super::coord::{CoordinateConverter, RawCoord, Units};
use super::macros::{self, MacroDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterpolationMode {
    Linear,
    ClockwiseArc,
    CounterClockwiseArc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionMode {
    Off,
    /// G36 seen, no subpath started yet.
    Open,
    Collecting,
}

#[derive(Debug)]
struct StepRepeatFrame {
    start_vertex: u32,
    start_index: u32,
    x_repeat: u32,
    y_repeat: u32,
    x_step: f64,
    y_step: f64,
}

/// Gerber state machine. Walks the command stream and dispatches each draw to
/// the geometry producers; individual failures degrade to warnings.
struct Interpreter {
    current: Point,
    aperture: Option<u32>,
    interpolation: InterpolationMode,
    region: RegionMode,
    region_points: Vec<Point>,
    polarity: Polarity,
    converter: CoordinateConverter,
    apertures: HashMap<u32, Aperture>,
    macros: HashMap<String, MacroDef>,
    sr_stack: Vec<StepRepeatFrame>,
    command_count: u32,
    done: bool,
    warned_single_quadrant: bool,
    warned_missing_units: bool,
    warned_missing_format: bool,
    units_seen: bool,
    format_seen: bool,
}

impl Interpreter {
    fn new() -> Self {
        Self {
            current: Point::new(0.0, 0.0),
            aperture: None,
            interpolation: InterpolationMode::Linear,
            region: RegionMode::Off,
            region_points: Vec::new(),
            polarity: Polarity::Dark,
            converter: CoordinateConverter::default(),
            apertures: HashMap::new(),
            macros: HashMap::new(),
            sr_stack: Vec::new(),
            command_count: 0,
            done: false,
            warned_single_quadrant: false,
            warned_missing_units: false,
            warned_missing_format: false,
            units_seen: false,
            format_seen: false,
        }
    }

    fn process(&mut self, command: &GerberCommand, builder: &mut MeshBuilder) {
        match command {
            GerberCommand::FormatSpec(format) => {
                self.converter.format = format.clone();
                self.format_seen = true;
            }
            GerberCommand::Units(units) => {
                self.converter.units = Some(*units);
                self.units_seen = true;
            }
            GerberCommand::ApertureDefine { code, aperture } => {
                if self.apertures.insert(*code, aperture.clone()).is_some() {
                    builder.warn(format!("aperture D{code} redefined; last definition wins"));
                }
            }
            GerberCommand::MacroDefine { name, body } => {
                let (content, warnings) = macros::parse_macro_body(name, body);
                for warning in warnings {
                    builder.warn(warning);
                }
                let def = MacroDef {
                    name: name.clone(),
                    content,
                };
                if self.macros.insert(name.clone(), def).is_some() {
                    builder.warn(format!(
                        "aperture macro `{name}` redefined; last definition wins"
                    ));
                }
            }
            GerberCommand::SelectAperture(code) => {
                self.aperture = Some(*code);
            }
            GerberCommand::LinearMode => self.interpolation = InterpolationMode::Linear,
            GerberCommand::ClockwiseArcMode => {
                self.interpolation = InterpolationMode::ClockwiseArc;
            }
            GerberCommand::CounterClockwiseArcMode => {
                self.interpolation = InterpolationMode::CounterClockwiseArc;
            }
            GerberCommand::SingleQuadrant => {
                if !self.warned_single_quadrant {
                    builder.warn(
                        "single-quadrant arc mode (G74) is deprecated; treating arcs as multi-quadrant"
                            .to_string(),
                    );
                    self.warned_single_quadrant = true;
                }
            }
            GerberCommand::MultiQuadrant => {}
            GerberCommand::Polarity(polarity) => {
                if *polarity != self.polarity {
                    match polarity {
                        Polarity::Clear => builder.open_clear_range(),
                        Polarity::Dark => builder.close_clear_range(),
                    }
                    self.polarity = *polarity;
                }
            }
            GerberCommand::RegionBegin => {
                self.region = RegionMode::Open;
                self.region_points.clear();
            }
            GerberCommand::RegionEnd => {
                if self.region == RegionMode::Off {
                    builder.warn("region end (G37) without region start; ignoring".to_string());
                } else {
                    self.close_subpath(builder);
                    self.region = RegionMode::Off;
                }
            }
            GerberCommand::Interpolate { x, y, i, j } => {
                self.handle_interpolate(*x, *y, *i, *j, builder);
            }
            GerberCommand::Move { x, y } => {
                let target = self.resolve_target(*x, *y, builder);
                self.current = target;
                if self.region != RegionMode::Off {
                    self.close_subpath(builder);
                    self.region_points.push(target);
                    self.region = RegionMode::Collecting;
                }
            }
            GerberCommand::Flash { x, y } => {
                self.handle_flash(*x, *y, builder);
            }
            GerberCommand::StepRepeatBegin {
                x_repeat,
                y_repeat,
                x_step,
                y_step,
            } => {
                self.sr_stack.push(StepRepeatFrame {
                    start_vertex: builder.vertex_count(),
                    start_index: builder.index_count(),
                    x_repeat: *x_repeat,
                    y_repeat: *y_repeat,
                    x_step: *x_step,
                    y_step: *y_step,
                });
            }
            GerberCommand::StepRepeatEnd => match self.sr_stack.pop() {
                Some(frame) => expand_frame(builder, &frame),
                None => {
                    builder.warn("step-repeat close (%SR%) without open block; ignoring".to_string());
                }
            },
            GerberCommand::Unsupported(directive) => {
                builder.warn(format!("unsupported directive %{directive}%; skipping"));
            }
            GerberCommand::EndOfFile => {
                self.done = true;
            }
        }
    }

    fn handle_interpolate(
        &mut self,
        x: Option<RawCoord>,
        y: Option<RawCoord>,
        i: Option<RawCoord>,
        j: Option<RawCoord>,
        builder: &mut MeshBuilder,
    ) {
        let from = self.current;
        let target = self.resolve_target(x, y, builder);
        self.current = target;

        if self.region != RegionMode::Off {
            if self.region == RegionMode::Open {
                // Draw without a preceding D02: the subpath starts at the
                // current point.
                self.region_points.push(from);
                self.region = RegionMode::Collecting;
            }
            match self.interpolation {
                InterpolationMode::Linear => self.region_points.push(target),
                InterpolationMode::ClockwiseArc | InterpolationMode::CounterClockwiseArc => {
                    let direction = self.arc_direction();
                    let offset = self.offset(i, j);
                    match arc::centerline(builder, from, target, offset, direction) {
                        Some(points) => self.region_points.extend(points.into_iter().skip(1)),
                        None => self.region_points.push(target),
                    }
                }
            }
            return;
        }

        let Some(aperture) = self.selected_aperture(builder) else {
            return;
        };

        let result = match self.interpolation {
            InterpolationMode::Linear => stroke::draw_linear(builder, from, target, &aperture),
            InterpolationMode::ClockwiseArc | InterpolationMode::CounterClockwiseArc => {
                arc::draw_arc(
                    builder,
                    from,
                    target,
                    self.offset(i, j),
                    self.arc_direction(),
                    &aperture,
                )
            }
        };
        if let Err(err) = result {
            builder.warn(err.to_string());
        }
    }

    fn handle_flash(
        &mut self,
        x: Option<RawCoord>,
        y: Option<RawCoord>,
        builder: &mut MeshBuilder,
    ) {
        let target = self.resolve_target(x, y, builder);
        self.current = target;

        if self.region != RegionMode::Off {
            builder.warn("flash (D03) inside a region; skipping".to_string());
            return;
        }

        let Some(aperture) = self.selected_aperture(builder) else {
            return;
        };

        let result = match &aperture {
            Aperture::Macro { name, params } => match self.macros.get(name) {
                Some(def) => macros::evaluate(builder, def, params, target, self.unit_scale()),
                None => {
                    warn!("flash references undefined aperture macro `{name}`");
                    builder.warn(
                        GeometryError::UndefinedReference(format!(
                            "aperture macro `{name}`; skipping flash"
                        ))
                        .to_string(),
                    );
                    return;
                }
            },
            _ => aperture::flash(builder, &aperture, target),
        };
        if let Err(err) = result {
            builder.warn(err.to_string());
        }
    }

    /// Close the current region subpath, filling it when it holds an actual
    /// boundary. A single buffered point is just a reposition.
    fn close_subpath(&mut self, builder: &mut MeshBuilder) {
        if self.region_points.len() >= 2 {
            let points = std::mem::take(&mut self.region_points);
            if let Err(err) = region::fill_region(builder, &points) {
                builder.warn(err.to_string());
            }
        } else {
            self.region_points.clear();
        }
    }

    fn arc_direction(&self) -> ArcDirection {
        if self.interpolation == InterpolationMode::ClockwiseArc {
            ArcDirection::Clockwise
        } else {
            ArcDirection::CounterClockwise
        }
    }

    /// Resolve a target point, inheriting missing axes from the current point.
    fn resolve_target(
        &mut self,
        x: Option<RawCoord>,
        y: Option<RawCoord>,
        builder: &mut MeshBuilder,
    ) -> Point {
        if x.is_some() || y.is_some() {
            self.check_header_state(builder);
        }
        Point::new(
            x.map_or(self.current.x, |raw| self.converter.x_to_mm(raw)),
            y.map_or(self.current.y, |raw| self.converter.y_to_mm(raw)),
        )
    }

    /// I/J offsets are relative; a missing axis means zero.
    fn offset(&self, i: Option<RawCoord>, j: Option<RawCoord>) -> Point {
        Point::new(
            i.map_or(0.0, |raw| self.converter.x_to_mm(raw)),
            j.map_or(0.0, |raw| self.converter.y_to_mm(raw)),
        )
    }

    fn check_header_state(&mut self, builder: &mut MeshBuilder) {
        if !self.units_seen && !self.warned_missing_units {
            builder.warn(
                "coordinate before %MO unit declaration; assuming millimetres".to_string(),
            );
            self.warned_missing_units = true;
        }
        if !self.format_seen && !self.warned_missing_format {
            builder.warn(
                "coordinate before %FS format specification; assuming 2.4 leading-zero absolute"
                    .to_string(),
            );
            self.warned_missing_format = true;
        }
    }

    fn selected_aperture(&self, builder: &mut MeshBuilder) -> Option<Aperture> {
        let Some(code) = self.aperture else {
            builder.warn("operation with no aperture selected; skipping".to_string());
            return None;
        };
        match self.apertures.get(&code) {
            Some(aperture) => Some(self.normalized_units(aperture.clone())),
            None => {
                warn!("operation references undefined aperture D{code}");
                builder.warn(
                    GeometryError::UndefinedReference(format!("aperture D{code}; skipping"))
                        .to_string(),
                );
                None
            }
        }
    }

    fn unit_scale(&self) -> f64 {
        match self.converter.units {
            Some(Units::Inches) => 25.4,
            _ => 1.0,
        }
    }

    /// Aperture dimensions are written in the file's unit; bring them to mm.
    /// Macro parameters stay raw — the evaluator scales its emitted geometry.
    fn normalized_units(&self, aperture: Aperture) -> Aperture {
        let scale = self.unit_scale();
        if scale == 1.0 {
            return aperture;
        }
        match aperture {
            Aperture::Circle { diameter } => Aperture::Circle {
                diameter: diameter * scale,
            },
            Aperture::Rectangle { width, height } => Aperture::Rectangle {
                width: width * scale,
                height: height * scale,
            },
            Aperture::Obround { width, height } => Aperture::Obround {
                width: width * scale,
                height: height * scale,
            },
            Aperture::Polygon {
                diameter,
                vertices,
                rotation,
            } => Aperture::Polygon {
                diameter: diameter * scale,
                vertices,
                rotation,
            },
            other @ Aperture::Macro { .. } => other,
        }
    }
}

fn expand_frame(builder: &mut MeshBuilder, frame: &StepRepeatFrame) {
    if let Err(err) = step_repeat::expand_grid(
        builder,
        frame.start_vertex,
        frame.start_index,
        frame.x_repeat,
        frame.y_repeat,
        frame.x_step,
        frame.y_step,
    ) {
        builder.warn(err.to_string());
    }
}

/// Interpret a command stream into a finished mesh.
///
/// `parse_warnings` (from the command parser) are recorded first so warning
/// order follows the file. Never fails: all problems degrade to warnings and
/// a partial mesh.
pub fn interpret(commands: &[GerberCommand], parse_warnings: Vec<String>) -> LayerMesh {
    let mut builder = MeshBuilder::new();
    for warning in parse_warnings {
        builder.warn(warning);
    }

    let mut interp = Interpreter::new();
    for command in commands {
        interp.command_count = interp.command_count.saturating_add(1);
        interp.process(command, &mut builder);
        if interp.done || builder.is_saturated() {
            break;
        }
    }

    if !interp.done && !builder.is_saturated() {
        builder.warn("truncated file: end-of-file marker M02 not seen".to_string());
    }

    if interp.region != RegionMode::Off {
        builder.warn("region not closed before end of file".to_string());
        interp.close_subpath(&mut builder);
    }

    while let Some(frame) = interp.sr_stack.pop() {
        builder.warn("step-repeat block not closed before end of file; expanding".to_string());
        expand_frame(&mut builder, &frame);
    }

    let mut mesh = builder.finish();
    mesh.command_count = interp.command_count;
    mesh
}
