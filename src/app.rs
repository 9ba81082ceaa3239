use image::{Rgba, RgbaImage};

use crate::camera::Camera;
use crate::components::colors::ColorSelector;
use crate::components::palette::Palette;
use crate::components::tools::{BrushType, Tool, ToolContext, ToolInput, ToolSession, Trigger};
use crate::error::{CanvasError, CanvasResult};
use crate::project::Document;
use crate::settings::AppSettings;

/// Colour painted around the canvas on the render surface.
const SURROUND: Rgba<u8> = Rgba([48, 48, 48, 255]);

/// Default swatches for a new editor.
const DEFAULT_SWATCHES: [[u8; 3]; 8] = [
    [0, 0, 0],
    [255, 255, 255],
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
];

/// One input delivered by the windowing layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    /// Pointer moved to a surface position.
    PointerMoved { x: f64, y: f64 },
    PointerDown,
    PointerUp,
    /// Wheel notches; positive zooms in.
    Wheel { notches: f64 },
    /// Render surface resized.
    Resize { width: u32, height: u32 },
    SelectTool(Tool),
    SetColor(Rgba<u8>),
    SetRadius(u32),
    SetBrush(BrushType),
    SetTolerance(f64),
    SelectLayer(usize),
    AddLayer,
    /// Click on the colour selector, in surface coordinates.
    ColorClick { x: f64, y: f64 },
    /// Swatch chosen from the palette.
    SelectSwatch(usize),
    ToggleFullscreen,
    ToggleGridlines,
}

/// Window-level toggles owned by the controller instead of globals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiState {
    pub fullscreen: bool,
    pub show_gridlines: bool,
}

/// Pointer transitions collected while draining one frame's events.
#[derive(Clone, Copy, Debug, Default)]
struct PointerFrame {
    pressed: bool,
    released: bool,
    /// Motion while held, for drag tools.
    moved: bool,
    delta: (f64, f64),
}

/// Editor controller: owns the document and all editing state and runs one
/// input → tool → composite cycle per [`PixiApp::frame`].
pub struct PixiApp {
    pub settings: AppSettings,
    document: Document,
    untitled_counter: usize,
    camera: Camera,
    session: ToolSession,
    tool: Tool,
    brush_radius: u32,
    brush_type: BrushType,
    tolerance: f64,
    active_layer: usize,
    colors: ColorSelector,
    palette: Palette,
    ui: UiState,
    pointer: (f64, f64),
    mouse_held: bool,
    screen: (u32, u32),
}

impl PixiApp {
    pub fn new(settings: AppSettings) -> Self {
        let document = Document::new_untitled(1, settings.grid_width, settings.grid_height);
        let camera = Self::camera_for(&settings, &document);
        let swatches: Vec<_> = DEFAULT_SWATCHES.iter().map(|c| Rgba([c[0], c[1], c[2], 255])).collect();
        let mut colors = ColorSelector::default();
        colors.set_from_rgba(swatches[0]);

        crate::log_info!(
            "editor started: {}x{} grid, {}x{} viewport",
            settings.grid_width, settings.grid_height, settings.viewport_width, settings.viewport_height
        );

        Self {
            document,
            untitled_counter: 1,
            camera,
            session: ToolSession::default(),
            tool: Tool::default(),
            brush_radius: settings.brush_radius,
            brush_type: settings.brush_type,
            tolerance: settings.fill_tolerance,
            active_layer: 0,
            colors,
            palette: Palette::new("default", swatches, 160, 20),
            ui: UiState { fullscreen: false, show_gridlines: settings.show_gridlines },
            pointer: (0.0, 0.0),
            mouse_held: false,
            screen: (settings.viewport_width, settings.viewport_height),
            settings,
        }
    }

    fn camera_for(settings: &AppSettings, document: &Document) -> Camera {
        Camera::new(
            document.width(),
            document.height(),
            0.0,
            0.0,
            settings.viewport_width,
            settings.viewport_height,
            1.0,
        )
    }

    /// Replace the document with a fresh untitled one and reset the view.
    pub fn new_document(&mut self, width: u32, height: u32) {
        self.untitled_counter += 1;
        self.document = Document::new_untitled(self.untitled_counter, width, height);
        self.camera = Self::camera_for(&self.settings, &self.document);
        self.session = ToolSession::default();
        self.active_layer = 0;
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn session(&self) -> &ToolSession {
        &self.session
    }

    pub fn color(&self) -> Rgba<u8> {
        self.colors.color()
    }

    pub fn colors(&self) -> &ColorSelector {
        &self.colors
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn ui(&self) -> UiState {
        self.ui
    }

    pub fn active_layer(&self) -> usize {
        self.active_layer
    }

    pub fn brush(&self) -> (u32, BrushType) {
        (self.brush_radius, self.brush_type)
    }

    /// Grid cell currently under the pointer.
    pub fn hovered_cell(&self) -> (i32, i32) {
        self.camera.screen_to_grid(self.pointer.0, self.pointer.1)
    }

    /// Run one frame: apply `events`, run the active tool once if its
    /// trigger fired, then redraw the tool preview.
    ///
    /// A rejected event (a bad layer index) is skipped and the rest of the
    /// frame still runs; the first such error is returned afterwards. Tool
    /// errors (a fill seeded off-grid) abort only the tool call.
    pub fn frame(&mut self, events: &[InputEvent]) -> CanvasResult<()> {
        let (pointer, rejected) = self.apply_events(events);
        let (gx, gy) = self.hovered_cell();

        self.tool.update(gx, gy, &mut self.session, self.mouse_held);

        let fire = match self.tool.trigger() {
            Trigger::Held => self.mouse_held,
            Trigger::Pressed => pointer.pressed,
            Trigger::Released => pointer.released,
            Trigger::Drag => self.mouse_held && pointer.moved,
        };

        let input = ToolInput {
            x: gx,
            y: gy,
            color: self.colors.color(),
            radius: self.brush_radius,
            brush: self.brush_type,
            layer: self.active_layer,
            tolerance: self.tolerance,
            delta: pointer.delta,
            screen: self.screen,
        };

        let result = if fire { self.run_tool(&input) } else { Ok(()) };

        self.document.canvas.clear_overlay();
        self.tool.preview(&mut self.document.canvas, &self.session, &input);
        match rejected {
            Some(e) => Err(e),
            None => result,
        }
    }

    fn run_tool(&mut self, input: &ToolInput) -> CanvasResult<()> {
        let mut ctx = ToolContext {
            canvas: &mut self.document.canvas,
            camera: &mut self.camera,
            colors: &mut self.colors,
            session: &mut self.session,
        };
        match self.tool.run(&mut ctx, input) {
            Ok(()) => {
                if !matches!(self.tool, Tool::Pan | Tool::Eyedropper) {
                    self.document.mark_dirty();
                }
                Ok(())
            }
            Err(e) => {
                crate::log_warn!("{} failed at ({}, {}): {}", self.tool.name(), input.x, input.y, e);
                Err(e)
            }
        }
    }

    fn apply_events(&mut self, events: &[InputEvent]) -> (PointerFrame, Option<CanvasError>) {
        let mut pointer = PointerFrame::default();
        let mut rejected = None;
        for event in events {
            match *event {
                InputEvent::PointerMoved { x, y } => {
                    if self.mouse_held {
                        pointer.delta.0 += x - self.pointer.0;
                        pointer.delta.1 += y - self.pointer.1;
                        pointer.moved = true;
                    }
                    self.pointer = (x, y);
                }
                InputEvent::PointerDown => {
                    self.mouse_held = true;
                    pointer.pressed = true;
                }
                InputEvent::PointerUp => {
                    self.mouse_held = false;
                    pointer.released = true;
                }
                InputEvent::Wheel { notches } => self.zoom_by(notches),
                InputEvent::Resize { width, height } => {
                    self.screen = (width, height);
                    self.camera.resize(width, height);
                    self.document.canvas.mark_all_dirty();
                }
                InputEvent::SelectTool(tool) => {
                    if tool != self.tool {
                        self.session = ToolSession { mouse_held: self.mouse_held, ..ToolSession::default() };
                        self.tool = tool;
                    }
                }
                InputEvent::SetColor(color) => self.colors.set_from_rgba(color),
                InputEvent::SetRadius(radius) => self.brush_radius = radius,
                InputEvent::SetBrush(brush) => self.brush_type = brush,
                InputEvent::SetTolerance(t) => self.tolerance = t.max(0.0),
                InputEvent::SelectLayer(index) => {
                    let count = self.document.canvas.layer_count();
                    if index < count {
                        self.active_layer = index;
                    } else {
                        crate::log_warn!("layer {} selected but the document has {}", index, count);
                        if rejected.is_none() {
                            rejected = Some(CanvasError::LayerIndex { index, count });
                        }
                    }
                }
                InputEvent::AddLayer => {
                    self.active_layer = self.document.add_blank_layer();
                }
                InputEvent::ColorClick { x, y } => {
                    self.colors.click(x, y);
                }
                InputEvent::SelectSwatch(index) => {
                    self.palette.select(index);
                    if let Some(color) = self.palette.selected() {
                        self.colors.set_from_rgba(color);
                    }
                }
                InputEvent::ToggleFullscreen => self.ui.fullscreen = !self.ui.fullscreen,
                InputEvent::ToggleGridlines => self.ui.show_gridlines = !self.ui.show_gridlines,
            }
        }
        (pointer, rejected)
    }

    /// Zoom by `notches` wheel steps around the pointer.
    fn zoom_by(&mut self, notches: f64) {
        if notches == 0.0 {
            return;
        }
        let target = self
            .settings
            .clamp_scale(self.camera.scale() * self.settings.zoom_step.powf(notches));
        self.camera.zoom_on(self.pointer, target);
    }

    /// Draw the current document onto `target`.
    pub fn render(&mut self, target: &mut RgbaImage) {
        for px in target.pixels_mut() {
            *px = SURROUND;
        }
        self.camera.draw(
            target,
            &mut self.document.canvas,
            self.settings.background,
            self.ui.show_gridlines,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::TRANSPARENT;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    /// 16×16 grid on a 320×320 viewport: 20px cells at scale 1.
    fn app() -> PixiApp {
        PixiApp::new(AppSettings::default())
    }

    fn cell_center(x: i32, y: i32) -> InputEvent {
        InputEvent::PointerMoved { x: x as f64 * 20.0 + 10.0, y: y as f64 * 20.0 + 10.0 }
    }

    fn composite(app: &PixiApp, x: i32, y: i32) -> Rgba<u8> {
        app.document().canvas.composited().color(x, y).unwrap()
    }

    #[test]
    fn paint_stroke_follows_pointer() {
        let mut app = app();
        app.frame(&[InputEvent::SetColor(RED), cell_center(1, 1), InputEvent::PointerDown])
            .unwrap();
        app.frame(&[cell_center(4, 1)]).unwrap();
        app.frame(&[InputEvent::PointerUp]).unwrap();

        for x in 1..=4 {
            assert_eq!(composite(&app, x, 1), RED);
        }
        assert_eq!(composite(&app, 5, 1), TRANSPARENT);
        assert_eq!(app.session().last_point(), None);
        assert!(app.document().is_dirty);
    }

    #[test]
    fn line_commits_on_release_only() {
        let mut app = app();
        app.frame(&[
            InputEvent::SelectTool(Tool::Line),
            InputEvent::SetColor(RED),
            cell_center(0, 0),
            InputEvent::PointerDown,
        ])
        .unwrap();
        app.frame(&[cell_center(3, 3)]).unwrap();
        assert_eq!(composite(&app, 2, 2), TRANSPARENT);
        assert_eq!(app.document().canvas.overlay().color(2, 2).unwrap(), RED);

        app.frame(&[InputEvent::PointerUp]).unwrap();
        for i in 0..4 {
            assert_eq!(composite(&app, i, i), RED);
        }
        assert_eq!(app.document().canvas.overlay().color(2, 2).unwrap(), TRANSPARENT);
    }

    #[test]
    fn fill_fires_once_per_press() {
        let mut app = app();
        app.frame(&[
            InputEvent::SelectTool(Tool::Fill),
            InputEvent::SetColor(RED),
            cell_center(5, 5),
            InputEvent::PointerDown,
        ])
        .unwrap();
        assert!(app.document().canvas.composited().cells().iter().all(|c| c.value == RED));

        app.frame(&[InputEvent::SetColor(TRANSPARENT)]).unwrap();
        assert_eq!(composite(&app, 0, 0), RED);
    }

    #[test]
    fn fill_outside_grid_reports_bounds() {
        let mut app = app();
        let result = app.frame(&[
            InputEvent::SelectTool(Tool::Fill),
            InputEvent::PointerMoved { x: -5.0, y: 5.0 },
            InputEvent::PointerDown,
        ]);
        assert!(matches!(result, Err(CanvasError::Bounds { x: -1, .. })));
    }

    #[test]
    fn wheel_zoom_keeps_cell_under_pointer() {
        let mut app = app();
        app.frame(&[InputEvent::PointerMoved { x: 105.0, y: 47.0 }]).unwrap();
        let before = app.hovered_cell();
        app.frame(&[InputEvent::Wheel { notches: 3.0 }]).unwrap();
        assert!(app.camera().scale() > 1.0);
        assert_eq!(app.hovered_cell(), before);

        app.frame(&[InputEvent::Wheel { notches: 500.0 }]).unwrap();
        assert_eq!(app.camera().scale(), app.settings.max_scale);
    }

    #[test]
    fn pan_moves_camera_while_dragging() {
        let mut app = app();
        app.frame(&[
            InputEvent::SelectTool(Tool::Pan),
            InputEvent::Resize { width: 800, height: 600 },
            InputEvent::PointerMoved { x: 100.0, y: 100.0 },
            InputEvent::PointerDown,
        ])
        .unwrap();
        app.frame(&[InputEvent::PointerMoved { x: 130.0, y: 90.0 }]).unwrap();
        assert_eq!(app.camera().position(), (30.0, -10.0));
        assert!(!app.document().is_dirty);
    }

    #[test]
    fn eyedropper_updates_current_colour() {
        let mut app = app();
        app.document_mut().canvas.write(2, 2, 0, Rgba([0, 0, 255, 255])).unwrap();
        app.frame(&[InputEvent::SelectTool(Tool::Eyedropper), cell_center(2, 2), InputEvent::PointerDown])
            .unwrap();
        assert_eq!(app.color(), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn layers_and_toggles() {
        let mut app = app();
        assert!(app.ui().show_gridlines);
        app.frame(&[InputEvent::ToggleFullscreen, InputEvent::ToggleGridlines]).unwrap();
        assert_eq!(app.ui(), UiState { fullscreen: true, show_gridlines: false });

        app.frame(&[InputEvent::AddLayer]).unwrap();
        assert_eq!(app.active_layer(), 1);
        assert_eq!(
            app.frame(&[InputEvent::SelectLayer(5)]),
            Err(CanvasError::LayerIndex { index: 5, count: 2 })
        );

        app.frame(&[InputEvent::SelectSwatch(2)]).unwrap();
        assert_eq!(app.color(), RED);
    }

    #[test]
    fn bad_layer_does_not_drop_later_events() {
        let mut app = app();
        app.frame(&[
            InputEvent::SelectTool(Tool::Line),
            InputEvent::SetColor(RED),
            cell_center(0, 0),
            InputEvent::PointerDown,
        ])
        .unwrap();
        app.frame(&[cell_center(3, 3)]).unwrap();

        let result = app.frame(&[InputEvent::SelectLayer(9), InputEvent::PointerUp]);
        assert_eq!(result, Err(CanvasError::LayerIndex { index: 9, count: 1 }));
        assert!(!app.session().mouse_held);
        assert_eq!(app.active_layer(), 0);
        assert_eq!(composite(&app, 2, 2), RED);
    }

    #[test]
    fn resize_updates_camera_viewport() {
        let mut app = app();
        app.frame(&[InputEvent::Resize { width: 640, height: 480 }]).unwrap();
        assert_eq!(app.camera().viewport(), (640, 480));
        assert_eq!(app.camera().cell_size(), 40.0);
        let dirty = app.document_mut().canvas.take_dirty().map(|r| (r.width(), r.height()));
        assert_eq!(dirty, Some((16, 16)));
    }

    #[test]
    fn render_draws_canvas_over_surround() {
        let mut app = app();
        app.document_mut().canvas.write(0, 0, 0, RED).unwrap();
        let mut surface = RgbaImage::new(400, 400);
        app.render(&mut surface);
        assert_eq!(*surface.get_pixel(5, 5), RED);
        assert_eq!(*surface.get_pixel(110, 110), Rgba([255, 255, 255, 255]));
        assert_eq!(*surface.get_pixel(350, 350), SURROUND);
    }
}
