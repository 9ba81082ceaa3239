use image::Rgba;
use rayon::prelude::*;

use crate::color::{self, TRANSPARENT, blend_over};
use crate::error::{CanvasError, CanvasResult};

// ============================================================================
// CELL
// ============================================================================

/// One addressable pixel of a [`Grid`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    pub value: Rgba<u8>,
}

impl Cell {
    pub fn new(x: u32, y: u32, value: Rgba<u8>) -> Self {
        Self { x, y, value }
    }

    /// Store `color` and return the previous value.
    pub fn set_color(&mut self, color: Rgba<u8>) -> Rgba<u8> {
        std::mem::replace(&mut self.value, color)
    }

    /// Like [`Cell::set_color`] but for unvalidated integer channels.
    pub fn try_set_color(&mut self, channels: [i64; 4]) -> CanvasResult<Rgba<u8>> {
        let color = color::rgba_from_ints(channels)?;
        Ok(self.set_color(color))
    }
}

// ============================================================================
// DIRTY REGION
// ============================================================================

/// Inclusive bounding box of composited cells changed since the last
/// [`LayeredCanvas::take_dirty`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DirtyRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl DirtyRect {
    pub fn point(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x, max_y: y }
    }

    pub fn union(self, other: DirtyRect) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

fn grow(dirty: &mut Option<DirtyRect>, rect: DirtyRect) {
    *dirty = Some(match *dirty {
        Some(d) => d.union(rect),
        None => rect,
    });
}

// ============================================================================
// GRID – one drawable layer
// ============================================================================

/// `width × height` cells stored row-major (`y * width + x`).
#[derive(Clone, Debug, PartialEq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Cell>,
}

impl Grid {
    /// Fully transparent grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, TRANSPARENT)
    }

    pub fn new_filled(width: u32, height: u32, value: Rgba<u8>) -> Self {
        let cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Cell::new(x, y, value)))
            .collect();
        Self { width, height, cells }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    #[inline]
    fn index_of(&self, x: i32, y: i32) -> CanvasResult<usize> {
        if self.contains(x, y) {
            Ok(y as usize * self.width as usize + x as usize)
        } else {
            Err(CanvasError::Bounds { x, y, width: self.width, height: self.height })
        }
    }

    pub fn get(&self, x: i32, y: i32) -> CanvasResult<&Cell> {
        let idx = self.index_of(x, y)?;
        Ok(&self.cells[idx])
    }

    pub fn get_mut(&mut self, x: i32, y: i32) -> CanvasResult<&mut Cell> {
        let idx = self.index_of(x, y)?;
        Ok(&mut self.cells[idx])
    }

    pub fn color(&self, x: i32, y: i32) -> CanvasResult<Rgba<u8>> {
        self.get(x, y).map(|c| c.value)
    }

    /// Store `value` at `(x, y)`, returning the previous color.
    pub fn set(&mut self, x: i32, y: i32, value: Rgba<u8>) -> CanvasResult<Rgba<u8>> {
        Ok(self.get_mut(x, y)?.set_color(value))
    }

    pub fn clear(&mut self, value: Rgba<u8>) {
        for cell in &mut self.cells {
            cell.value = value;
        }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width.max(1) as usize)
    }

    /// Sorted, de-duplicated flat indices of the in-bounds coordinates.
    fn flat_indices(&self, coords: &[(i32, i32)]) -> Vec<usize> {
        let mut indices: Vec<usize> = coords
            .iter()
            .filter_map(|&(x, y)| self.index_of(x, y).ok())
            .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Run `f` over the cells named by `indices` in parallel batches of
/// `batch_size`.
///
/// `indices` must be sorted and free of duplicates. Each batch owns the
/// sub-slice `[first..=last]` of its own indices, carved off with
/// `split_at_mut`, so no two batches can ever touch the same cell.
fn for_each_batched<F>(cells: &mut [Cell], indices: &[usize], batch_size: usize, f: F)
where
    F: Fn(&mut Cell) + Sync + Send,
{
    let mut jobs: Vec<(usize, &mut [Cell], &[usize])> = Vec::new();
    let mut rest: &mut [Cell] = cells;
    let mut offset = 0usize;

    for batch in indices.chunks(batch_size.max(1)) {
        let Some(&last) = batch.last() else { continue };
        let (window, tail) = std::mem::take(&mut rest).split_at_mut(last + 1 - offset);
        jobs.push((offset, window, batch));
        offset = last + 1;
        rest = tail;
    }

    jobs.into_par_iter().for_each(|(base, window, batch)| {
        for &i in batch {
            f(&mut window[i - base]);
        }
    });
}

fn bounding_rect(cells: &[Cell], indices: &[usize]) -> Option<DirtyRect> {
    indices
        .iter()
        .map(|&i| DirtyRect::point(cells[i].x, cells[i].y))
        .reduce(DirtyRect::union)
}

// ============================================================================
// PIXEL TARGET – what drawing tools write into
// ============================================================================

/// A surface the drawing tools can read and write: a bare [`Grid`] or one
/// layer of a [`LayeredCanvas`] (see [`LayerMut`]).
pub trait PixelTarget {
    fn dimensions(&self) -> (u32, u32);

    fn contains(&self, x: i32, y: i32) -> bool {
        let (w, h) = self.dimensions();
        x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h
    }

    fn color_at(&self, x: i32, y: i32) -> CanvasResult<Rgba<u8>>;

    fn put(&mut self, x: i32, y: i32, color: Rgba<u8>) -> CanvasResult<()>;

    /// Write `color` to every in-bounds coordinate of `coords` using disjoint
    /// parallel batches; out-of-bounds entries are skipped.
    fn put_batched(&mut self, coords: &[(i32, i32)], color: Rgba<u8>, batch_size: usize);
}

impl PixelTarget for Grid {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn color_at(&self, x: i32, y: i32) -> CanvasResult<Rgba<u8>> {
        self.color(x, y)
    }

    fn put(&mut self, x: i32, y: i32, color: Rgba<u8>) -> CanvasResult<()> {
        self.set(x, y, color).map(|_| ())
    }

    fn put_batched(&mut self, coords: &[(i32, i32)], color: Rgba<u8>, batch_size: usize) {
        let indices = self.flat_indices(coords);
        for_each_batched(&mut self.cells, &indices, batch_size, |cell| cell.value = color);
    }
}

// ============================================================================
// LAYERED CANVAS
// ============================================================================

/// Which layers [`LayeredCanvas::clear`] resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearTarget {
    All,
    Layer(usize),
}

/// Bottom-to-top stack of [`Grid`]s plus a transient overlay and a cached
/// composite.
///
/// The composite is derived from `layers` alone and updated inside the same
/// call that mutates a layer, so readers never see a half-updated cell.
/// The overlay is blended only at render time.
#[derive(Clone, Debug)]
pub struct LayeredCanvas {
    width: u32,
    height: u32,
    layers: Vec<Grid>,
    overlay: Grid,
    composited: Grid,
    dirty: Option<DirtyRect>,
}

/// Composite of every layer at flat index `idx`, bottom to top.
fn composite_at(layers: &[Grid], idx: usize) -> Rgba<u8> {
    let mut acc: Option<Rgba<u8>> = None;
    for layer in layers {
        let c = layer.cells[idx].value;
        if c[3] == 0 {
            continue;
        }
        acc = Some(match acc {
            Some(below) => blend_over(c, below),
            None => c,
        });
    }
    acc.unwrap_or(TRANSPARENT)
}

impl LayeredCanvas {
    /// Empty canvas with no layers; every composited cell is transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            overlay: Grid::new(width, height),
            composited: Grid::new(width, height),
            dirty: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn check_layer(&self, index: usize) -> CanvasResult<()> {
        if index < self.layers.len() {
            Ok(())
        } else {
            Err(CanvasError::LayerIndex { index, count: self.layers.len() })
        }
    }

    /// Insert `grid` at `insert_at` (or on top when `None`) and recompute
    /// the whole composite.
    pub fn add_layer(&mut self, grid: Grid, insert_at: Option<usize>) -> CanvasResult<usize> {
        if grid.width != self.width || grid.height != self.height {
            crate::log_warn!(
                "rejected {}x{} layer on {}x{} canvas",
                grid.width, grid.height, self.width, self.height
            );
            return Err(CanvasError::DimensionMismatch {
                got_width: grid.width,
                got_height: grid.height,
                width: self.width,
                height: self.height,
            });
        }
        let index = insert_at.unwrap_or(self.layers.len());
        if index > self.layers.len() {
            return Err(CanvasError::LayerIndex { index, count: self.layers.len() + 1 });
        }
        self.layers.insert(index, grid);
        crate::log_info!("layer inserted at {} ({} total)", index, self.layers.len());
        self.recompute_all();
        Ok(index)
    }

    /// Push a transparent layer on top and return its index.
    pub fn push_blank_layer(&mut self) -> usize {
        let index = self.layers.len();
        self.layers.push(Grid::new(self.width, self.height));
        index
    }

    pub fn layer(&self, index: usize) -> CanvasResult<&Grid> {
        self.check_layer(index)?;
        Ok(&self.layers[index])
    }

    /// Writable view of one layer that keeps the composite in sync.
    pub fn layer_mut(&mut self, index: usize) -> CanvasResult<LayerMut<'_>> {
        self.check_layer(index)?;
        Ok(LayerMut { canvas: self, layer: index })
    }

    pub fn read(&self, x: i32, y: i32, layer: usize) -> CanvasResult<Rgba<u8>> {
        self.check_layer(layer)?;
        self.layers[layer].color(x, y)
    }

    /// Set one layer cell and recompute only that composited cell.
    pub fn write(&mut self, x: i32, y: i32, layer: usize, color: Rgba<u8>) -> CanvasResult<()> {
        self.check_layer(layer)?;
        let idx = self.layers[layer].index_of(x, y)?;
        self.layers[layer].cells[idx].value = color;
        self.refresh_cell(idx);
        Ok(())
    }

    fn refresh_cell(&mut self, idx: usize) {
        let value = composite_at(&self.layers, idx);
        let cell = &mut self.composited.cells[idx];
        if cell.value != value {
            cell.value = value;
            let rect = DirtyRect::point(cell.x, cell.y);
            grow(&mut self.dirty, rect);
        }
    }

    /// Composite of all layers at `(x, y)` computed from scratch.
    pub fn compute_cell(&self, x: i32, y: i32) -> CanvasResult<Rgba<u8>> {
        let idx = self.composited.index_of(x, y)?;
        Ok(composite_at(&self.layers, idx))
    }

    /// Cached composite (overlay excluded).
    pub fn composited(&self) -> &Grid {
        &self.composited
    }

    pub fn overlay(&self) -> &Grid {
        &self.overlay
    }

    /// The preview layer. Writes here never reach the composite.
    pub fn overlay_mut(&mut self) -> &mut Grid {
        &mut self.overlay
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.clear(TRANSPARENT);
    }

    pub fn clear(&mut self, value: Rgba<u8>, target: ClearTarget) -> CanvasResult<()> {
        match target {
            ClearTarget::All => self.layers.iter_mut().for_each(|l| l.clear(value)),
            ClearTarget::Layer(index) => {
                self.check_layer(index)?;
                self.layers[index].clear(value);
            }
        }
        self.recompute_all();
        Ok(())
    }

    /// Recompute every composited cell, writing (and marking dirty) only
    /// the cells whose value actually changed.
    pub fn recompute_all(&mut self) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let layers = &self.layers;
        let width = self.width as usize;

        let spans: Vec<DirtyRect> = self
            .composited
            .cells
            .par_chunks_mut(width)
            .enumerate()
            .filter_map(|(row, cells)| {
                let mut span: Option<DirtyRect> = None;
                for (col, cell) in cells.iter_mut().enumerate() {
                    let value = composite_at(layers, row * width + col);
                    if cell.value != value {
                        cell.value = value;
                        grow(&mut span, DirtyRect::point(cell.x, cell.y));
                    }
                }
                span
            })
            .collect();

        if let Some(rect) = spans.into_iter().reduce(DirtyRect::union) {
            grow(&mut self.dirty, rect);
        }
    }

    /// Region changed since the previous call (if any), resetting it.
    pub fn take_dirty(&mut self) -> Option<DirtyRect> {
        self.dirty.take()
    }

    /// Mark the whole canvas dirty, e.g. after the renderer lost its cache.
    pub fn mark_all_dirty(&mut self) {
        if self.width > 0 && self.height > 0 {
            self.dirty = Some(DirtyRect {
                min_x: 0,
                min_y: 0,
                max_x: self.width - 1,
                max_y: self.height - 1,
            });
        }
    }
}

/// One layer of a [`LayeredCanvas`] exposed as a [`PixelTarget`].
pub struct LayerMut<'a> {
    canvas: &'a mut LayeredCanvas,
    layer: usize,
}

impl LayerMut<'_> {
    pub fn index(&self) -> usize {
        self.layer
    }
}

impl PixelTarget for LayerMut<'_> {
    fn dimensions(&self) -> (u32, u32) {
        (self.canvas.width, self.canvas.height)
    }

    fn color_at(&self, x: i32, y: i32) -> CanvasResult<Rgba<u8>> {
        self.canvas.read(x, y, self.layer)
    }

    fn put(&mut self, x: i32, y: i32, color: Rgba<u8>) -> CanvasResult<()> {
        self.canvas.write(x, y, self.layer, color)
    }

    fn put_batched(&mut self, coords: &[(i32, i32)], color: Rgba<u8>, batch_size: usize) {
        let canvas = &mut *self.canvas;
        let indices = canvas.composited.flat_indices(coords);
        if indices.is_empty() {
            return;
        }

        for_each_batched(&mut canvas.layers[self.layer].cells, &indices, batch_size, |cell| {
            cell.value = color
        });

        let layers = &canvas.layers;
        let width = canvas.width as usize;
        for_each_batched(&mut canvas.composited.cells, &indices, batch_size, |cell| {
            cell.value = composite_at(layers, cell.y as usize * width + cell.x as usize)
        });

        if let Some(rect) = bounding_rect(&canvas.composited.cells, &indices) {
            grow(&mut canvas.dirty, rect);
        }
    }
}
