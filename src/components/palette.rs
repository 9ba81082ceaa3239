use image::{Pixel, Rgb, Rgba};

/// Named list of swatches laid out in rows of `width / cell_size` cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    pub name: String,
    colors: Vec<Rgba<u8>>,
    selected: usize,
    pub width: u32,
    pub cell_size: u32,
}

impl Palette {
    pub fn new(name: impl Into<String>, colors: Vec<Rgba<u8>>, width: u32, cell_size: u32) -> Self {
        Self {
            name: name.into(),
            colors,
            selected: 0,
            width,
            cell_size: cell_size.max(1),
        }
    }

    /// Build from opaque RGB records (the binary palette file format).
    pub fn from_rgb(name: impl Into<String>, colors: &[Rgb<u8>], width: u32, cell_size: u32) -> Self {
        Self::new(name, colors.iter().map(|c| c.to_rgba()).collect(), width, cell_size)
    }

    /// Colours as RGB records, alpha dropped.
    pub fn to_rgb(&self) -> Vec<Rgb<u8>> {
        self.colors.iter().map(|c| c.to_rgb()).collect()
    }

    pub fn colors(&self) -> &[Rgba<u8>] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Rgba<u8>> {
        self.colors.get(index).copied()
    }

    /// Replace a swatch; returns `false` for an out-of-range index.
    pub fn set(&mut self, index: usize, color: Rgba<u8>) -> bool {
        match self.colors.get_mut(index) {
            Some(slot) => {
                *slot = color;
                true
            }
            None => false,
        }
    }

    pub fn add_color(&mut self, color: Rgba<u8>) {
        self.colors.push(color);
    }

    /// Out-of-range indices are ignored.
    pub fn select(&mut self, index: usize) {
        if index < self.colors.len() {
            self.selected = index;
        }
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<Rgba<u8>> {
        self.get(self.selected)
    }

    pub fn cells_per_row(&self) -> u32 {
        (self.width / self.cell_size).max(1)
    }

    pub fn rows(&self) -> u32 {
        (self.colors.len() as u32).div_ceil(self.cells_per_row())
    }

    pub fn height(&self) -> u32 {
        self.rows() * self.cell_size
    }

    /// Swatch index under a point relative to the palette's top-left corner.
    pub fn index_at(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let col = x as u32 / self.cell_size;
        let row = y as u32 / self.cell_size;
        if col >= self.cells_per_row() {
            return None;
        }
        let index = (row * self.cells_per_row() + col) as usize;
        (index < self.colors.len()).then_some(index)
    }
}
