use std::collections::VecDeque;

use image::Rgba;

use crate::camera::Camera;
use crate::canvas::{ClearTarget, LayeredCanvas, PixelTarget};
use crate::color::{TRANSPARENT, color_distance};
use crate::components::colors::ColorSelector;
use crate::error::{CanvasError, CanvasResult};

/// Brushes at or above this radius are written in large batches.
pub const LARGE_BRUSH_RADIUS: u32 = 4;
pub const LARGE_BATCH_SIZE: usize = 256;
pub const SMALL_BATCH_SIZE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Paint,
    Eraser,
    Line,
    Fill,
    Clear,
    Pan,
    Eyedropper,
}

/// Brush footprint shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BrushType {
    Square,
    #[default]
    Circle,
}

impl BrushType {
    pub fn label(&self) -> &'static str {
        match self {
            BrushType::Square => "square",
            BrushType::Circle => "circle",
        }
    }

    /// `"default"` and anything unknown map to the circle brush.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "square" => BrushType::Square,
            _ => BrushType::Circle,
        }
    }
}

/// When the frame loop fires a tool's `run`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Every frame while the pointer is held.
    Held,
    /// On the frame the pointer is pressed.
    Pressed,
    /// On the frame the pointer is released.
    Released,
    /// On pointer motion while held.
    Drag,
}

/// Per-stroke state shared by every tool call within a frame.
///
/// `x / y` hold the pending point of a stroke (continuous Paint strokes, the
/// start of a Line drag).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToolSession {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub mouse_held: bool,
}

impl ToolSession {
    pub fn last_point(&self) -> Option<(i32, i32)> {
        self.x.zip(self.y)
    }

    pub fn set_point(&mut self, x: i32, y: i32) {
        self.x = Some(x);
        self.y = Some(y);
    }

    pub fn reset_point(&mut self) {
        self.x = None;
        self.y = None;
    }
}

/// Everything a tool invocation needs besides mutable state.
#[derive(Clone, Copy, Debug)]
pub struct ToolInput {
    /// Grid cell under the pointer.
    pub x: i32,
    pub y: i32,
    pub color: Rgba<u8>,
    pub radius: u32,
    pub brush: BrushType,
    pub layer: usize,
    pub tolerance: f64,
    /// Pointer motion this frame in screen pixels (Pan).
    pub delta: (f64, f64),
    /// Size of the surface the camera draws on (Pan clamping).
    pub screen: (u32, u32),
}

impl ToolInput {
    pub fn at(x: i32, y: i32, color: Rgba<u8>) -> Self {
        Self {
            x,
            y,
            color,
            radius: 0,
            brush: BrushType::Circle,
            layer: 0,
            tolerance: 0.0,
            delta: (0.0, 0.0),
            screen: (0, 0),
        }
    }
}

/// Mutable state a tool may touch.
pub struct ToolContext<'a> {
    pub canvas: &'a mut LayeredCanvas,
    pub camera: &'a mut Camera,
    pub colors: &'a mut ColorSelector,
    pub session: &'a mut ToolSession,
}

impl Tool {
    pub fn all() -> &'static [Tool] {
        &[
            Tool::Paint,
            Tool::Eraser,
            Tool::Line,
            Tool::Fill,
            Tool::Clear,
            Tool::Pan,
            Tool::Eyedropper,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Paint => "paintbrush",
            Tool::Eraser => "eraser",
            Tool::Line => "line",
            Tool::Fill => "fill",
            Tool::Clear => "clear",
            Tool::Pan => "pan",
            Tool::Eyedropper => "eyedropper",
        }
    }

    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::all().iter().copied().find(|t| t.name() == name)
    }

    pub fn trigger(&self) -> Trigger {
        match self {
            Tool::Paint | Tool::Eraser => Trigger::Held,
            Tool::Line => Trigger::Released,
            Tool::Fill | Tool::Clear | Tool::Eyedropper => Trigger::Pressed,
            Tool::Pan => Trigger::Drag,
        }
    }

    /// Per-frame bookkeeping, called whichever tool is active.
    pub fn update(&self, x: i32, y: i32, session: &mut ToolSession, mouse_held: bool) {
        session.mouse_held = mouse_held;
        match self {
            Tool::Paint | Tool::Eraser => {
                if !mouse_held {
                    session.reset_point();
                }
            }
            Tool::Line => {
                if mouse_held && session.last_point().is_none() {
                    session.set_point(x, y);
                }
            }
            _ => {}
        }
    }

    pub fn run(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> CanvasResult<()> {
        match self {
            Tool::Paint | Tool::Eraser => {
                let color = if *self == Tool::Eraser { TRANSPARENT } else { input.color };
                let mut layer = ctx.canvas.layer_mut(input.layer)?;
                paint(&mut layer, input.x, input.y, color, input.radius, input.brush, ctx.session);
            }
            Tool::Line => {
                let start = ctx.session.last_point().unwrap_or((input.x, input.y));
                let mut layer = ctx.canvas.layer_mut(input.layer)?;
                line(&mut layer, start, (input.x, input.y), input.color, input.radius);
                ctx.session.reset_point();
                ctx.canvas.clear_overlay();
            }
            Tool::Fill => {
                let mut layer = ctx.canvas.layer_mut(input.layer)?;
                let filled = flood_fill(&mut layer, input.x, input.y, input.color, input.tolerance)?;
                crate::log_info!("fill at ({}, {}) repainted {} cells", input.x, input.y, filled);
            }
            Tool::Clear => {
                ctx.canvas.clear(input.color, ClearTarget::Layer(input.layer))?;
            }
            Tool::Pan => {
                let (dx, dy) = input.delta;
                ctx.camera.pan_clamped(dx, dy, input.screen.0, input.screen.1);
            }
            Tool::Eyedropper => {
                eyedropper(ctx.canvas, input.x, input.y, None, ctx.colors);
            }
        }
        Ok(())
    }

    /// Draw this tool's in-progress preview into the canvas overlay.
    pub fn preview(&self, canvas: &mut LayeredCanvas, session: &ToolSession, input: &ToolInput) {
        let overlay = canvas.overlay_mut();
        match self {
            Tool::Line if session.mouse_held => {
                if let Some(start) = session.last_point() {
                    line(overlay, start, (input.x, input.y), input.color, input.radius);
                }
            }
            Tool::Paint if overlay.contains(input.x, input.y) => {
                let coords = brush_footprint(input.x, input.y, input.radius, input.brush, overlay.dimensions());
                overlay.put_batched(&coords, input.color, batch_size_for(input.radius));
            }
            _ => {}
        }
    }
}

// ============================================================================
// Rasterizers
// ============================================================================

pub fn batch_size_for(radius: u32) -> usize {
    if radius >= LARGE_BRUSH_RADIUS {
        LARGE_BATCH_SIZE
    } else {
        SMALL_BATCH_SIZE
    }
}

/// Cells covered by one brush dab centred on `(x, y)`, clipped to a grid of
/// `bounds` cells.
///
/// Candidate offsets are clamped to the grid before enumeration, so the work
/// is bounded by the grid size whatever the radius.
pub fn brush_footprint(x: i32, y: i32, radius: u32, brush: BrushType, bounds: (u32, u32)) -> Vec<(i32, i32)> {
    let (cx, cy, r) = (x as i64, y as i64, radius as i64);
    let (lo, hi) = match brush {
        _ if radius == 0 => (0, 0),
        BrushType::Square if radius == 1 => (-1, 0),
        BrushType::Square => (-(r - 1), r - 1),
        BrushType::Circle => (-r, r),
    };
    let round = brush == BrushType::Circle && radius > 0;
    let r_sq = (r as i128) * (r as i128);

    let xs = (cx + lo).max(0)..=(cx + hi).min(bounds.0 as i64 - 1);
    let ys = (cy + lo).max(0)..=(cy + hi).min(bounds.1 as i64 - 1);
    let mut coords = Vec::new();
    for px in xs {
        for py in ys.clone() {
            let (i, j) = ((px - cx) as i128, (py - cy) as i128);
            if !round || i * i + j * j <= r_sq {
                coords.push((px as i32, py as i32));
            }
        }
    }
    coords
}

/// One paint dab or stroke segment.
///
/// Off-grid `(x, y)` is a no-op. Radius 0 draws a 1px line from the
/// session's pending point (or `(x, y)`) so fast strokes stay gap-free, then
/// moves the pending point to `(x, y)`. Larger radii stamp the brush
/// footprint, clipped to the grid.
pub fn paint<T: PixelTarget + ?Sized>(
    target: &mut T,
    x: i32,
    y: i32,
    color: Rgba<u8>,
    radius: u32,
    brush: BrushType,
    session: &mut ToolSession,
) {
    if !target.contains(x, y) {
        return;
    }

    if radius == 0 {
        let start = session.last_point().unwrap_or((x, y));
        line(target, start, (x, y), color, 0);
        session.set_point(x, y);
        return;
    }

    let coords = brush_footprint(x, y, radius, brush, target.dimensions());
    target.put_batched(&coords, color, batch_size_for(radius));
}

pub fn erase<T: PixelTarget + ?Sized>(
    target: &mut T,
    x: i32,
    y: i32,
    radius: u32,
    brush: BrushType,
    session: &mut ToolSession,
) {
    paint(target, x, y, TRANSPARENT, radius, brush, session);
}

/// Lazy Bresenham walk from one cell to another, inclusive.
///
/// Deltas and the error term are kept in `i64`, so any pair of `i32`
/// endpoints is safe; every yielded point lies between the endpoints.
#[derive(Clone, Debug)]
pub struct LinePoints {
    x: i64,
    y: i64,
    end: (i64, i64),
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    done: bool,
}

impl LinePoints {
    pub fn new(from: (i32, i32), to: (i32, i32)) -> Self {
        let (x, y) = (from.0 as i64, from.1 as i64);
        let end = (to.0 as i64, to.1 as i64);
        let dx = (end.0 - x).abs();
        let dy = (end.1 - y).abs();
        Self {
            x,
            y,
            end,
            dx,
            dy,
            sx: if x < end.0 { 1 } else { -1 },
            sy: if y < end.1 { 1 } else { -1 },
            err: dx - dy,
            done: false,
        }
    }
}

impl Iterator for LinePoints {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let point = (self.x as i32, self.y as i32);
        if (self.x, self.y) == self.end {
            self.done = true;
            return Some(point);
        }
        let e2 = self.err * 2;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(point)
    }
}

/// Every cell Bresenham's algorithm visits from `from` to `to`, inclusive.
pub fn line_points(from: (i32, i32), to: (i32, i32)) -> Vec<(i32, i32)> {
    LinePoints::new(from, to).collect()
}

/// Draw a Bresenham line and return how many points were stamped.
///
/// Stepping stops at the first point off the grid, so a far endpoint costs
/// no more than the cells actually drawn. With `radius > 0` each point
/// stamps the `2r × 2r` square spanning `[-r, r)` on both axes instead.
pub fn line<T: PixelTarget + ?Sized>(
    target: &mut T,
    from: (i32, i32),
    to: (i32, i32),
    color: Rgba<u8>,
    radius: u32,
) -> usize {
    let (width, height) = target.dimensions();
    let r = radius as i64;
    let mut stamped = 0;
    for (x, y) in LinePoints::new(from, to) {
        if !target.contains(x, y) {
            break;
        }
        if radius == 0 {
            if target.put(x, y, color).is_ok() {
                stamped += 1;
            }
            continue;
        }

        let (x, y) = (x as i64, y as i64);
        let xs = (x - r).max(0)..(x + r).min(width as i64);
        let ys = (y - r).max(0)..(y + r).min(height as i64);
        let square: Vec<(i32, i32)> = xs
            .flat_map(|i| ys.clone().map(move |j| (i as i32, j as i32)))
            .collect();
        target.put_batched(&square, color, batch_size_for(radius));
        stamped += 1;
    }
    stamped
}

/// 4-connected flood fill from `(x, y)`.
///
/// Cells within `tolerance` (Euclidean RGBA distance) of the seed colour are
/// repainted. A fill colour identical to the seed colour is a no-op. Returns
/// the number of repainted cells.
pub fn flood_fill<T: PixelTarget + ?Sized>(
    target: &mut T,
    x: i32,
    y: i32,
    fill: Rgba<u8>,
    tolerance: f64,
) -> CanvasResult<usize> {
    let (width, height) = target.dimensions();
    if !target.contains(x, y) {
        return Err(CanvasError::Bounds { x, y, width, height });
    }

    let seed = target.color_at(x, y)?;
    if color_distance(seed, fill) == 0.0 {
        return Ok(0);
    }

    let w = width as usize;
    let mut visited = vec![false; w * height as usize];
    let mut queue: VecDeque<(i32, i32)> = VecDeque::new();
    queue.push_back((x, y));
    let mut filled = 0;

    while let Some((cx, cy)) = queue.pop_front() {
        if !target.contains(cx, cy) {
            continue;
        }
        let idx = cy as usize * w + cx as usize;
        if visited[idx] {
            continue;
        }
        if color_distance(target.color_at(cx, cy)?, seed) <= tolerance {
            target.put(cx, cy, fill)?;
            visited[idx] = true;
            filled += 1;
            queue.extend([(cx + 1, cy), (cx - 1, cy), (cx, cy + 1), (cx, cy - 1)]);
        }
    }
    Ok(filled)
}

/// Colour at `(x, y)` of `layer`, or of the composite when `layer` is
/// `None`. Anything off-grid reads as transparent black.
pub fn pick(canvas: &LayeredCanvas, x: i32, y: i32, layer: Option<usize>) -> Rgba<u8> {
    let sampled = match layer {
        Some(l) => canvas.read(x, y, l),
        None => canvas.composited().color(x, y),
    };
    sampled.unwrap_or(TRANSPARENT)
}

/// Sample a colour into the colour selector and return it.
pub fn eyedropper(
    canvas: &LayeredCanvas,
    x: i32,
    y: i32,
    layer: Option<usize>,
    colors: &mut ColorSelector,
) -> Rgba<u8> {
    let color = pick(canvas, x, y, layer);
    colors.set_from_rgba(color);
    color
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Grid;
    use crate::color::Hsv;
    use std::collections::BTreeSet;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn painted(grid: &Grid, color: Rgba<u8>) -> BTreeSet<(u32, u32)> {
        grid.cells().iter().filter(|c| c.value == color).map(|c| (c.x, c.y)).collect()
    }

    #[test]
    fn footprint_sizes() {
        let grid = (16, 16);
        assert_eq!(brush_footprint(5, 5, 0, BrushType::Circle, grid), vec![(5, 5)]);
        let square1: BTreeSet<_> = brush_footprint(5, 5, 1, BrushType::Square, grid).into_iter().collect();
        assert_eq!(square1, BTreeSet::from([(5, 5), (4, 5), (5, 4), (4, 4)]));
        assert_eq!(brush_footprint(5, 5, 3, BrushType::Square, grid).len(), 25);
        assert_eq!(brush_footprint(5, 5, 1, BrushType::Circle, grid).len(), 5);
        assert_eq!(brush_footprint(5, 5, 2, BrushType::Circle, grid).len(), 13);
        assert_eq!(brush_footprint(0, 0, 1, BrushType::Square, grid), vec![(0, 0)]);
    }

    #[test]
    fn huge_radius_is_bounded_by_the_grid() {
        let grid = (8, 6);
        for radius in [50_000, u32::MAX] {
            assert_eq!(brush_footprint(0, 0, radius, BrushType::Circle, grid).len(), 48);
            assert_eq!(brush_footprint(7, 5, radius, BrushType::Square, grid).len(), 48);
        }
        assert!(brush_footprint(i32::MIN, i32::MAX, u32::MAX, BrushType::Circle, grid).len() <= 48);

        let mut target = Grid::new(8, 6);
        let mut session = ToolSession::default();
        paint(&mut target, 3, 3, RED, u32::MAX, BrushType::Square, &mut session);
        assert_eq!(painted(&target, RED).len(), 48);
    }

    #[test]
    fn paint_clips_at_edges_and_ignores_off_grid() {
        let mut grid = Grid::new(4, 4);
        let mut session = ToolSession::default();
        paint(&mut grid, 0, 0, RED, 1, BrushType::Circle, &mut session);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(0, 0), (1, 0), (0, 1)]));

        paint(&mut grid, -1, 2, BLUE, 3, BrushType::Circle, &mut session);
        assert!(painted(&grid, BLUE).is_empty());
        assert_eq!(session.last_point(), None);
    }

    #[test]
    fn zero_radius_strokes_connect_samples() {
        let mut grid = Grid::new(6, 6);
        let mut session = ToolSession::default();
        paint(&mut grid, 0, 0, RED, 0, BrushType::Circle, &mut session);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(0, 0)]));
        paint(&mut grid, 3, 3, RED, 0, BrushType::Circle, &mut session);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(0, 0), (1, 1), (2, 2), (3, 3)]));
        assert_eq!(session.last_point(), Some((3, 3)));
    }

    #[test]
    fn large_brush_matches_footprint() {
        let mut grid = Grid::new(32, 32);
        let mut session = ToolSession::default();
        paint(&mut grid, 2, 16, RED, 9, BrushType::Circle, &mut session);

        let expected: BTreeSet<(u32, u32)> = brush_footprint(2, 16, 9, BrushType::Circle, (32, 32))
            .into_iter()
            .filter(|&(x, y)| grid.contains(x, y))
            .map(|(x, y)| (x as u32, y as u32))
            .collect();
        assert_eq!(painted(&grid, RED), expected);
    }

    #[test]
    fn eraser_writes_transparent() {
        let mut grid = Grid::new_filled(3, 3, RED);
        let mut session = ToolSession::default();
        erase(&mut grid, 1, 1, 2, BrushType::Square, &mut session);
        assert_eq!(grid.color(1, 1).unwrap(), TRANSPARENT);
        assert_eq!(grid.color(0, 0).unwrap(), TRANSPARENT);
        assert_eq!(grid.color(2, 2).unwrap(), TRANSPARENT);
    }

    #[test]
    fn bresenham_diagonal_and_shallow() {
        assert_eq!(line_points((0, 0), (3, 3)), vec![(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(line_points((0, 0), (4, 2)), vec![(0, 0), (1, 0), (2, 1), (3, 1), (4, 2)]);
        assert_eq!(line_points((3, 3), (0, 3)), vec![(3, 3), (2, 3), (1, 3), (0, 3)]);
        assert_eq!(line_points((2, 2), (2, 2)), vec![(2, 2)]);
    }

    #[test]
    fn line_stops_at_the_edge() {
        let mut grid = Grid::new(4, 4);
        assert_eq!(line(&mut grid, (-1, 0), (3, 0), RED, 0), 0);
        assert!(painted(&grid, RED).is_empty());

        assert_eq!(line(&mut grid, (2, 0), (6, 0), RED, 0), 2);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(2, 0), (3, 0)]));
    }

    #[test]
    fn extreme_endpoints_walk_lazily() {
        let mut walk = LinePoints::new((-2_000_000_000, 0), (2_000_000_000, 0));
        assert_eq!(walk.next(), Some((-2_000_000_000, 0)));
        assert_eq!(walk.next(), Some((-1_999_999_999, 0)));

        let mut corner = LinePoints::new((i32::MIN, i32::MIN), (i32::MAX, i32::MAX));
        assert_eq!(corner.nth(1), Some((i32::MIN + 1, i32::MIN + 1)));

        let mut grid = Grid::new(4, 4);
        assert_eq!(line(&mut grid, (0, 1), (1_000_000_000, 1), RED, 0), 4);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(0, 1), (1, 1), (2, 1), (3, 1)]));
        assert_eq!(line(&mut grid, (-2_000_000_000, 0), (2_000_000_000, 0), BLUE, 0), 0);
        assert_eq!(line(&mut grid, (3, 3), (3, i32::MIN), BLUE, u32::MAX), 4);
        assert_eq!(painted(&grid, BLUE).len(), 16);
    }

    #[test]
    fn thick_line_stamps_offset_square() {
        let mut grid = Grid::new(5, 5);
        line(&mut grid, (2, 2), (2, 2), RED, 1);
        assert_eq!(painted(&grid, RED), BTreeSet::from([(1, 1), (2, 1), (1, 2), (2, 2)]));
    }

    #[test]
    fn fill_uniform_grid() {
        let mut grid = Grid::new_filled(5, 4, BLUE);
        assert_eq!(flood_fill(&mut grid, 2, 2, RED, 0.0), Ok(20));
        assert_eq!(painted(&grid, RED).len(), 20);

        let before = grid.clone();
        assert_eq!(flood_fill(&mut grid, 0, 0, RED, 0.0), Ok(0));
        assert_eq!(grid, before);
    }

    #[test]
    fn fill_respects_walls_and_tolerance() {
        let mut grid = Grid::new(5, 5);
        for y in 0..5 {
            grid.set(2, y, BLUE).unwrap();
        }
        grid.set(0, 0, Rgba([0, 0, 0, 3])).unwrap();

        assert_eq!(flood_fill(&mut grid, 1, 1, RED, 0.0), Ok(9));
        assert_eq!(grid.color(0, 0).unwrap(), Rgba([0, 0, 0, 3]));
        assert_eq!(grid.color(3, 3).unwrap(), TRANSPARENT);

        let mut grid = Grid::new(3, 1);
        grid.set(2, 0, Rgba([0, 0, 0, 3])).unwrap();
        assert_eq!(flood_fill(&mut grid, 0, 0, RED, 3.0), Ok(3));
    }

    #[test]
    fn fill_outside_grid_is_an_error() {
        let mut grid = Grid::new(2, 2);
        assert_eq!(
            flood_fill(&mut grid, 2, 0, RED, 0.0),
            Err(CanvasError::Bounds { x: 2, y: 0, width: 2, height: 2 })
        );
    }

    #[test]
    fn names_round_trip() {
        for tool in Tool::all() {
            assert_eq!(Tool::from_name(tool.name()), Some(*tool));
        }
        assert_eq!(Tool::from_name("lasso"), None);
        assert_eq!(BrushType::from_name("default"), BrushType::Circle);
        assert_eq!(BrushType::from_name("Square"), BrushType::Square);
    }

    #[test]
    fn update_tracks_pending_points() {
        let mut session = ToolSession::default();
        Tool::Line.update(1, 2, &mut session, true);
        Tool::Line.update(5, 5, &mut session, true);
        assert_eq!(session.last_point(), Some((1, 2)));
        assert!(session.mouse_held);

        Tool::Line.update(5, 5, &mut session, false);
        assert_eq!(session.last_point(), Some((1, 2)));

        Tool::Paint.update(5, 5, &mut session, false);
        assert_eq!(session.last_point(), None);
        assert!(!session.mouse_held);
    }

    #[test]
    fn line_tool_commits_from_session_start() {
        let mut canvas = LayeredCanvas::new(4, 4);
        canvas.add_layer(Grid::new(4, 4), None).unwrap();
        let mut camera = Camera::new(4, 4, 0.0, 0.0, 40, 40, 1.0);
        let mut colors = ColorSelector::default();
        let mut session = ToolSession::default();

        Tool::Line.update(0, 0, &mut session, true);
        let input = ToolInput::at(3, 3, RED);
        Tool::Line.preview(&mut canvas, &session, &input);
        assert_eq!(canvas.overlay().color(1, 1).unwrap(), RED);
        assert_eq!(canvas.composited().color(1, 1).unwrap(), TRANSPARENT);

        Tool::Line.update(3, 3, &mut session, false);
        let mut ctx = ToolContext {
            canvas: &mut canvas,
            camera: &mut camera,
            colors: &mut colors,
            session: &mut session,
        };
        Tool::Line.run(&mut ctx, &input).unwrap();

        assert_eq!(session.last_point(), None);
        assert_eq!(canvas.overlay().color(1, 1).unwrap(), TRANSPARENT);
        for i in 0..4 {
            assert_eq!(canvas.composited().color(i, i).unwrap(), RED);
        }
    }

    #[test]
    fn eyedropper_feeds_selector() {
        let mut canvas = LayeredCanvas::new(2, 2);
        canvas.add_layer(Grid::new(2, 2), None).unwrap();
        canvas.write(1, 1, 0, BLUE).unwrap();
        let mut colors = ColorSelector::default();

        assert_eq!(eyedropper(&canvas, 1, 1, None, &mut colors), BLUE);
        assert_eq!(colors.hsv(), Hsv::new(240, 100, 100));
        assert_eq!(eyedropper(&canvas, 9, 9, Some(0), &mut colors), TRANSPARENT);
        assert_eq!(colors.color(), TRANSPARENT);
        assert_eq!(pick(&canvas, 1, 1, Some(3)), TRANSPARENT);
    }

    #[test]
    fn tool_run_reports_bad_layer() {
        let mut canvas = LayeredCanvas::new(2, 2);
        let mut camera = Camera::new(2, 2, 0.0, 0.0, 20, 20, 1.0);
        let mut colors = ColorSelector::default();
        let mut session = ToolSession::default();
        let mut ctx = ToolContext {
            canvas: &mut canvas,
            camera: &mut camera,
            colors: &mut colors,
            session: &mut session,
        };
        assert_eq!(
            Tool::Paint.run(&mut ctx, &ToolInput::at(0, 0, RED)),
            Err(CanvasError::LayerIndex { index: 0, count: 0 })
        );
    }
}
