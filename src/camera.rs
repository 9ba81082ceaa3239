use image::{Rgb, RgbImage, Rgba, RgbaImage, imageops};

use crate::canvas::{DirtyRect, LayeredCanvas};
use crate::color::to_rgb;

/// Below this zoom factor gridlines are never drawn.
pub const GRIDLINE_MIN_SCALE: f64 = 0.91;
/// Below this on-screen cell size (px) gridlines are never drawn.
pub const GRIDLINE_MIN_CELL_PX: f64 = 5.0;
pub const GRIDLINE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Smallest scale `set_scale` will store (keeps `scale > 0`).
pub const MIN_SCALE: f64 = 0.01;

/// Screen-space viewport over a [`LayeredCanvas`].
///
/// `real_x / real_y` is where the top-left of the grid lands on screen,
/// `width × height` is the unscaled viewport size in screen pixels and
/// `scale` the zoom factor (always rounded to two decimals).
pub struct Camera {
    real_x: f64,
    real_y: f64,
    width: u32,
    height: u32,
    scale: f64,
    grid_width: u32,
    grid_height: u32,

    /// Set whenever scale or viewport size changes; the scaled buffer is
    /// reallocated before the next draw.
    scale_dirty: bool,
    /// Composite flattened against `flat_background`, one pixel per cell.
    flat: RgbImage,
    flat_background: Option<Rgb<u8>>,
    /// `flat` with the overlay blended on.
    frame: RgbImage,
    scaled: RgbaImage,
}

impl Camera {
    pub fn new(
        grid_width: u32,
        grid_height: u32,
        real_x: f64,
        real_y: f64,
        width: u32,
        height: u32,
        scale: f64,
    ) -> Self {
        let mut camera = Self {
            real_x,
            real_y,
            width,
            height,
            scale: 1.0,
            grid_width,
            grid_height,
            scale_dirty: true,
            flat: RgbImage::new(grid_width, grid_height),
            flat_background: None,
            frame: RgbImage::new(grid_width, grid_height),
            scaled: RgbaImage::new(1, 1),
        };
        camera.set_scale(scale);
        camera
    }

    pub fn position(&self) -> (f64, f64) {
        (self.real_x, self.real_y)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Direct assignment; clamping is the caller's business.
    pub fn set_position(&mut self, x: f64, y: f64) {
        self.real_x = x;
        self.real_y = y;
    }

    /// Store `scale` rounded to two decimals (never below [`MIN_SCALE`]).
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = round2(scale).max(MIN_SCALE);
        self.scale_dirty = true;
    }

    /// Resize the viewport (the grid itself never resizes).
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.scale_dirty = true;
    }

    /// Zoom to `new_scale` keeping the grid point under `origin` fixed on
    /// screen.
    pub fn zoom_on(&mut self, origin: (f64, f64), new_scale: f64) {
        let target = round2(new_scale).max(MIN_SCALE);
        let dx = origin.0 - self.real_x;
        let dy = origin.1 - self.real_y;
        let ratio = target / self.scale;

        let new_x = origin.0 - dx * ratio;
        let new_y = origin.1 - dy * ratio;

        self.set_scale(target);
        self.set_position(new_x, new_y);
    }

    /// On-screen size of one cell in pixels.
    pub fn cell_size(&self) -> f64 {
        (self.width as f64 / self.grid_width.max(1) as f64) * self.scale
    }

    /// Grid cell under a screen pixel. May lie outside the grid.
    pub fn screen_to_grid(&self, px: f64, py: f64) -> (i32, i32) {
        let cell = self.cell_size();
        (
            ((px - self.real_x) / cell).floor() as i32,
            ((py - self.real_y) / cell).floor() as i32,
        )
    }

    /// Screen position of a cell's top-left corner.
    pub fn grid_to_screen(&self, gx: i32, gy: i32) -> (f64, f64) {
        let cell = self.cell_size();
        (self.real_x + gx as f64 * cell, self.real_y + gy as f64 * cell)
    }

    /// Size of the scaled grid image on screen.
    pub fn scaled_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.scale) as u32,
            (self.height as f64 * self.scale) as u32,
        )
    }

    /// Pan by a mouse delta, clamped so at least one row/column of cells
    /// stays reachable on a `screen_width × screen_height` surface.
    pub fn pan_clamped(&mut self, dx: f64, dy: f64, screen_width: u32, screen_height: u32) {
        let cell = self.cell_size();
        let (extent_x, extent_y) = self.scaled_size();
        let x = clamp_soft(self.real_x + dx, cell - extent_x as f64, screen_width as f64 - cell);
        let y = clamp_soft(self.real_y + dy, cell - extent_y as f64, screen_height as f64 - cell);
        self.set_position(x, y);
    }

    /// Whether [`Camera::draw`] would draw gridlines at the current zoom.
    pub fn gridlines_visible(&self) -> bool {
        self.scale >= GRIDLINE_MIN_SCALE && self.cell_size() >= GRIDLINE_MIN_CELL_PX
    }

    /// Render `canvas` onto `target` at `(real_x, real_y)`.
    ///
    /// Only the composite region reported dirty since the last draw is
    /// re-flattened; a background change refreshes everything. The overlay
    /// is blended over the flattened composite, the result is scaled
    /// (nearest neighbour) to the viewport size times `scale`, gridlines are
    /// added when the zoom allows and the buffer is blitted.
    pub fn draw(
        &mut self,
        target: &mut RgbaImage,
        canvas: &mut LayeredCanvas,
        background: Rgb<u8>,
        draw_gridlines: bool,
    ) {
        self.refresh_flat(canvas, background);
        self.blend_overlay(canvas);

        let (sw, sh) = self.scaled_size();
        if sw == 0 || sh == 0 || self.grid_width == 0 || self.grid_height == 0 {
            return;
        }
        if self.scale_dirty || self.scaled.dimensions() != (sw, sh) {
            self.scaled = RgbaImage::new(sw, sh);
            self.scale_dirty = false;
        }
        self.scale_frame();

        if draw_gridlines && self.gridlines_visible() {
            self.draw_gridlines();
        }

        imageops::replace(target, &self.scaled, self.real_x as i64, self.real_y as i64);
    }

    fn refresh_flat(&mut self, canvas: &mut LayeredCanvas, background: Rgb<u8>) {
        let dims = (canvas.width(), canvas.height());
        let full = self.flat_background != Some(background) || self.flat.dimensions() != dims;
        let dirty = canvas.take_dirty();

        let region = if full {
            if self.flat.dimensions() != dims {
                self.flat = RgbImage::new(dims.0, dims.1);
                self.frame = RgbImage::new(dims.0, dims.1);
            }
            self.flat_background = Some(background);
            if dims.0 == 0 || dims.1 == 0 {
                return;
            }
            DirtyRect { min_x: 0, min_y: 0, max_x: dims.0 - 1, max_y: dims.1 - 1 }
        } else {
            match dirty {
                Some(rect) => rect,
                None => return,
            }
        };

        let composited = canvas.composited();
        for row in composited.rows().skip(region.min_y as usize).take(region.height() as usize) {
            for cell in &row[region.min_x as usize..=region.max_x as usize] {
                self.flat.put_pixel(cell.x, cell.y, to_rgb(cell.value, background));
            }
        }
    }

    fn blend_overlay(&mut self, canvas: &LayeredCanvas) {
        self.frame.copy_from_slice(&self.flat);
        for cell in canvas.overlay().cells() {
            if cell.value[3] == 0 {
                continue;
            }
            let below = *self.frame.get_pixel(cell.x, cell.y);
            self.frame.put_pixel(cell.x, cell.y, to_rgb(cell.value, below));
        }
    }

    fn scale_frame(&mut self) {
        let (sw, sh) = self.scaled.dimensions();
        let (fw, fh) = self.frame.dimensions();
        for dy in 0..sh {
            let sy = ((dy as u64 * fh as u64) / sh as u64) as u32;
            for dx in 0..sw {
                let sx = ((dx as u64 * fw as u64) / sw as u64) as u32;
                let Rgb([r, g, b]) = *self.frame.get_pixel(sx, sy);
                self.scaled.put_pixel(dx, dy, Rgba([r, g, b, 255]));
            }
        }
    }

    fn draw_gridlines(&mut self) {
        let cell = self.cell_size();
        let (sw, sh) = self.scaled.dimensions();

        for i in 0..=self.grid_width {
            let x = (i as f64 * cell) as u32;
            if x >= sw {
                break;
            }
            for y in 0..sh {
                self.scaled.put_pixel(x, y, GRIDLINE_COLOR);
            }
        }
        for j in 0..=self.grid_height {
            let y = (j as f64 * cell) as u32;
            if y >= sh {
                break;
            }
            for x in 0..sw {
                self.scaled.put_pixel(x, y, GRIDLINE_COLOR);
            }
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `clamp` that tolerates `lo > hi` (tiny screens), preferring `hi`.
fn clamp_soft(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}
