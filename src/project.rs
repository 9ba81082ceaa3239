use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::LayeredCanvas;

/// Single open document.
pub struct Document {
    pub id: Uuid,
    pub canvas: LayeredCanvas,
    /// Where the last PNG export went. `None` until exported.
    pub path: Option<PathBuf>,
    pub is_dirty: bool,

    /// Display name ("Untitled-N" or the export file name)
    pub name: String,
}

impl Document {
    /// Fresh document with one transparent base layer.
    pub fn new_untitled(untitled_counter: usize, width: u32, height: u32) -> Self {
        let mut canvas = LayeredCanvas::new(width, height);
        canvas.push_blank_layer();
        Self::from_canvas(format!("Untitled-{}", untitled_counter), canvas)
    }

    pub fn from_canvas(name: impl Into<String>, canvas: LayeredCanvas) -> Self {
        Self {
            id: Uuid::new_v4(),
            canvas,
            path: None,
            is_dirty: false,
            name: name.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// Append a blank layer and return its index.
    pub fn add_blank_layer(&mut self) -> usize {
        self.is_dirty = true;
        self.canvas.push_blank_layer()
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.is_dirty = false;
    }

    /// Record an export location and take the display name from it.
    pub fn set_path(&mut self, path: PathBuf) {
        self.name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        self.path = Some(path);
    }

    /// Get the display title (name with dirty indicator)
    pub fn display_title(&self) -> String {
        if self.is_dirty {
            format!("{}*", self.name)
        } else {
            self.name.clone()
        }
    }
}
