// ============================================================================
// PixiPaint scripting: sandboxed Rhai engine driving the tool engine
// ============================================================================
//
// Scripts run against one document and one camera. Every drawing call goes
// through the same tools the interactive editor uses, so a script produces
// exactly what the equivalent clicks would.

use image::Rgba;
use rhai::{Array, Dynamic, Engine, EvalAltResult, ImmutableString, Position, Scope};
use std::sync::{Arc, Mutex};

use crate::camera::Camera;
use crate::canvas::{Grid, PixelTarget};
use crate::color::{parse_hex, rgba_from_ints};
use crate::components::colors::ColorSelector;
use crate::components::tools::{BrushType, Tool, ToolContext, ToolInput, ToolSession, flood_fill};
use crate::error::{CanvasError, ScriptError};
use crate::project::Document;
use crate::settings::AppSettings;

/// Operation budget per script run.
pub const MAX_OPERATIONS: u64 = 50_000_000;

// ============================================================================
// Script context: shared mutable state between engine and host functions
// ============================================================================

struct ScriptContext {
    document: Document,
    camera: Camera,
    session: ToolSession,
    colors: ColorSelector,
    radius: u32,
    brush: BrushType,
    tolerance: f64,
    layer: usize,
    /// Zoom range every camera call is clamped to.
    scale_range: (f64, f64),
    console_output: Vec<String>,
}

impl ScriptContext {
    fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.scale_range.0, self.scale_range.1)
    }

    fn input(&self, x: i64, y: i64) -> ToolInput {
        ToolInput {
            x: clamp_i32(x),
            y: clamp_i32(y),
            color: self.colors.color(),
            radius: self.radius,
            brush: self.brush,
            layer: self.layer,
            tolerance: self.tolerance,
            delta: (0.0, 0.0),
            screen: self.camera.viewport(),
        }
    }

    /// Run `tool` once at `(x, y)`. `start` seeds the stroke's pending
    /// point; otherwise every call is an independent dab.
    fn run_tool(&mut self, tool: Tool, x: i64, y: i64, start: Option<(i32, i32)>) -> Result<(), CanvasError> {
        self.session.reset_point();
        if let Some((sx, sy)) = start {
            self.session.set_point(sx, sy);
        }
        let input = self.input(x, y);
        let mut ctx = ToolContext {
            canvas: &mut self.document.canvas,
            camera: &mut self.camera,
            colors: &mut self.colors,
            session: &mut self.session,
        };
        tool.run(&mut ctx, &input)?;
        if tool != Tool::Eyedropper {
            self.document.mark_dirty();
        }
        Ok(())
    }
}

type SharedContext = Arc<Mutex<ScriptContext>>;

/// What a successful run leaves behind.
pub struct ScriptRun {
    pub document: Document,
    pub camera: Camera,
    pub console_output: Vec<String>,
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn canvas_error(e: CanvasError) -> Box<EvalAltResult> {
    Box::new(EvalAltResult::ErrorRuntime(Dynamic::from(e.to_string()), Position::NONE))
}

fn color_array(c: Rgba<u8>) -> Array {
    c.0.iter().map(|&v| Dynamic::from(v as i64)).collect()
}

fn script_error(message: String, pos: Position) -> ScriptError {
    ScriptError {
        message,
        line: pos.line().filter(|&l| l > 0),
        column: pos.position().filter(|&p| p > 0),
    }
}

// ============================================================================
// Engine construction with sandbox + API registration
// ============================================================================

fn create_engine(ctx: SharedContext) -> Engine {
    let mut engine = Engine::new();

    // Sandbox limits
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_call_levels(64);
    engine.set_max_expr_depths(64, 64);
    engine.set_max_string_size(10_000);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(1_000);

    register_canvas_api(&mut engine, ctx.clone());
    register_brush_api(&mut engine, ctx.clone());
    register_tool_api(&mut engine, ctx.clone());
    register_camera_api(&mut engine, ctx.clone());

    let c = ctx;
    engine.on_print(move |msg| {
        crate::log_info!("[script] {}", msg);
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.console_output.push(msg.to_string());
    });

    engine
}

// ============================================================================
// Canvas and layer API
// ============================================================================

fn register_canvas_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("width", move || -> i64 {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.document.width() as i64
    });

    let c = ctx.clone();
    engine.register_fn("height", move || -> i64 {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.document.height() as i64
    });

    let c = ctx.clone();
    engine.register_fn("layer_count", move || -> i64 {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.document.canvas.layer_count() as i64
    });

    // add_layer() -> index, on top; becomes the active layer
    let c = ctx.clone();
    engine.register_fn("add_layer", move || -> i64 {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let index = lock.document.add_blank_layer();
        lock.layer = index;
        index as i64
    });

    // add_layer(index) inserts a blank layer below the existing `index`
    let c = ctx.clone();
    engine.register_fn("add_layer", move |index: i64| -> Result<i64, Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let count = lock.document.canvas.layer_count();
        let at = usize::try_from(index).map_err(|_| {
            canvas_error(CanvasError::LayerIndex { index: usize::MAX, count: count + 1 })
        })?;
        let grid = Grid::new(lock.document.width(), lock.document.height());
        let inserted = lock.document.canvas.add_layer(grid, Some(at)).map_err(canvas_error)?;
        lock.document.mark_dirty();
        lock.layer = inserted;
        Ok(inserted as i64)
    });

    let c = ctx.clone();
    engine.register_fn("set_layer", move |index: i64| -> Result<(), Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let count = lock.document.canvas.layer_count();
        match usize::try_from(index) {
            Ok(i) if i < count => {
                lock.layer = i;
                Ok(())
            }
            _ => Err(canvas_error(CanvasError::LayerIndex {
                index: usize::try_from(index).unwrap_or(usize::MAX),
                count,
            })),
        }
    });

    // get_pixel(x, y) -> [r, g, b, a] of the composite
    let c = ctx.clone();
    engine.register_fn("get_pixel", move |x: i64, y: i64| -> Result<Array, Box<EvalAltResult>> {
        let lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let color = lock
            .document
            .canvas
            .composited()
            .color_at(clamp_i32(x), clamp_i32(y))
            .map_err(canvas_error)?;
        Ok(color_array(color))
    });

    // get_pixel(x, y, layer) -> [r, g, b, a] of one layer
    let c = ctx;
    engine.register_fn(
        "get_pixel",
        move |x: i64, y: i64, layer: i64| -> Result<Array, Box<EvalAltResult>> {
            let lock = c.lock().unwrap_or_else(|e| e.into_inner());
            let layer = usize::try_from(layer).unwrap_or(usize::MAX);
            let color = lock
                .document
                .canvas
                .read(clamp_i32(x), clamp_i32(y), layer)
                .map_err(canvas_error)?;
            Ok(color_array(color))
        },
    );
}

// ============================================================================
// Colour and brush state
// ============================================================================

fn register_brush_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn(
        "set_color",
        move |r: i64, g: i64, b: i64, a: i64| -> Result<(), Box<EvalAltResult>> {
            let color = rgba_from_ints([r, g, b, a]).map_err(canvas_error)?;
            let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
            lock.colors.set_from_rgba(color);
            Ok(())
        },
    );

    let c = ctx.clone();
    engine.register_fn("set_color", move |r: i64, g: i64, b: i64| -> Result<(), Box<EvalAltResult>> {
        let color = rgba_from_ints([r, g, b, 255]).map_err(canvas_error)?;
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.colors.set_from_rgba(color);
        Ok(())
    });

    // set_color("#rrggbb")
    let c = ctx.clone();
    engine.register_fn("set_color", move |hex: ImmutableString| -> Result<(), Box<EvalAltResult>> {
        let Some(rgb) = parse_hex(&hex) else {
            return Err(format!("'{}' is not a #rrggbb colour", hex).into());
        };
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.colors.set_from_rgba(Rgba([rgb[0], rgb[1], rgb[2], 255]));
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_radius", move |radius: i64| -> Result<(), Box<EvalAltResult>> {
        let radius = u32::try_from(radius).map_err(|_| canvas_error(CanvasError::Range { value: radius }))?;
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.radius = radius;
        Ok(())
    });

    let c = ctx.clone();
    engine.register_fn("set_brush", move |name: ImmutableString| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.brush = BrushType::from_name(&name);
    });

    let c = ctx.clone();
    engine.register_fn("set_tolerance", move |t: f64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.tolerance = t.max(0.0);
    });

    let c = ctx;
    engine.register_fn("set_tolerance", move |t: i64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.tolerance = t.max(0) as f64;
    });
}

// ============================================================================
// Tools
// ============================================================================

fn register_tool_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("paint", move |x: i64, y: i64| -> Result<(), Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.run_tool(Tool::Paint, x, y, None).map_err(canvas_error)
    });

    let c = ctx.clone();
    engine.register_fn("erase", move |x: i64, y: i64| -> Result<(), Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.run_tool(Tool::Eraser, x, y, None).map_err(canvas_error)
    });

    let c = ctx.clone();
    engine.register_fn(
        "line",
        move |x1: i64, y1: i64, x2: i64, y2: i64| -> Result<(), Box<EvalAltResult>> {
            let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
            let start = (clamp_i32(x1), clamp_i32(y1));
            lock.run_tool(Tool::Line, x2, y2, Some(start)).map_err(canvas_error)
        },
    );

    // fill(x, y) -> number of repainted cells
    let c = ctx.clone();
    engine.register_fn("fill", move |x: i64, y: i64| -> Result<i64, Box<EvalAltResult>> {
        let mut guard = c.lock().unwrap_or_else(|e| e.into_inner());
        let lock = &mut *guard;
        let input = lock.input(x, y);
        let mut layer = lock.document.canvas.layer_mut(input.layer).map_err(canvas_error)?;
        let filled = flood_fill(&mut layer, input.x, input.y, input.color, input.tolerance)
            .map_err(canvas_error)?;
        if filled > 0 {
            lock.document.mark_dirty();
        }
        Ok(filled as i64)
    });

    // clear() fills the active layer with the current colour
    let c = ctx.clone();
    engine.register_fn("clear", move || -> Result<(), Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.run_tool(Tool::Clear, 0, 0, None).map_err(canvas_error)
    });

    // pick(x, y) -> [r, g, b, a]; the sample becomes the current colour
    let c = ctx;
    engine.register_fn("pick", move |x: i64, y: i64| -> Result<Array, Box<EvalAltResult>> {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.run_tool(Tool::Eyedropper, x, y, None).map_err(canvas_error)?;
        Ok(color_array(lock.colors.color()))
    });
}

// ============================================================================
// Camera
// ============================================================================

fn register_camera_api(engine: &mut Engine, ctx: SharedContext) {
    let c = ctx.clone();
    engine.register_fn("set_position", move |x: f64, y: f64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.camera.set_position(x, y);
    });

    let c = ctx.clone();
    engine.register_fn("set_position", move |x: i64, y: i64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        lock.camera.set_position(x as f64, y as f64);
    });

    let c = ctx.clone();
    engine.register_fn("set_scale", move |s: f64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let s = lock.clamp_scale(s);
        lock.camera.set_scale(s);
    });

    let c = ctx.clone();
    engine.register_fn("set_scale", move |s: i64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let s = lock.clamp_scale(s as f64);
        lock.camera.set_scale(s);
    });

    let c = ctx.clone();
    engine.register_fn("zoom_on", move |x: f64, y: f64, s: f64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let s = lock.clamp_scale(s);
        lock.camera.zoom_on((x, y), s);
    });

    let c = ctx;
    engine.register_fn("zoom_on", move |x: i64, y: i64, s: f64| {
        let mut lock = c.lock().unwrap_or_else(|e| e.into_inner());
        let s = lock.clamp_scale(s);
        lock.camera.zoom_on((x as f64, y as f64), s);
    });
}

// ============================================================================
// Public execution API
// ============================================================================

pub fn run_script(source: &str, document: Document, camera: Camera) -> Result<ScriptRun, ScriptError> {
    run_script_with(source, document, camera, &AppSettings::default())
}

pub fn run_script_with(
    source: &str,
    document: Document,
    camera: Camera,
    settings: &AppSettings,
) -> Result<ScriptRun, ScriptError> {
    let start = std::time::Instant::now();
    let ctx = Arc::new(Mutex::new(ScriptContext {
        document,
        camera,
        session: ToolSession::default(),
        colors: ColorSelector::default(),
        radius: 0,
        brush: BrushType::default(),
        tolerance: 0.0,
        layer: 0,
        scale_range: (settings.min_scale, settings.max_scale),
        console_output: Vec::new(),
    }));

    let engine = create_engine(ctx.clone());
    let mut scope = Scope::new();

    let result = engine
        .compile(source)
        .map_err(|e| script_error(e.to_string(), e.position()))
        .and_then(|ast| {
            engine
                .run_ast_with_scope(&mut scope, &ast)
                .map_err(|e| script_error(e.to_string(), e.position()))
        });
    drop(engine);

    if let Err(e) = result {
        crate::log_warn!("script failed after {} ms: {}", start.elapsed().as_millis(), e);
        return Err(e);
    }

    let ctx = Arc::try_unwrap(ctx).map_err(|_| ScriptError {
        message: "script context still shared after the run".to_string(),
        line: None,
        column: None,
    })?;
    let ctx = ctx.into_inner().unwrap_or_else(|e| e.into_inner());
    crate::log_info!("script finished in {} ms", start.elapsed().as_millis());

    Ok(ScriptRun {
        document: ctx.document,
        camera: ctx.camera,
        console_output: ctx.console_output,
    })
}
