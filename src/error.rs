use thiserror::Error;

/// Failures raised by the grid / layered canvas API.
///
/// Structural errors (`DimensionMismatch`, a flood fill seeded off-grid) are
/// returned before anything is mutated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanvasError {
    #[error("coordinate ({x}, {y}) is outside the {width}x{height} grid")]
    Bounds {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },

    #[error("layer index {index} is outside 0..{count}")]
    LayerIndex { index: usize, count: usize },

    #[error("layer is {got_width}x{got_height} but the canvas is {width}x{height}")]
    DimensionMismatch {
        got_width: u32,
        got_height: u32,
        width: u32,
        height: u32,
    },

    #[error("color channel value {value} is outside 0..=255")]
    Range { value: i64 },
}

/// Failures while reading or writing a binary palette file.
#[derive(Debug, Error)]
pub enum PaletteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("palette data is {len} bytes, not a whole number of RGB records")]
    Truncated { len: usize },
}

/// A script that failed to compile or run.
#[derive(Debug, Clone)]
pub struct ScriptError {
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ScriptError {
    /// Error text with line/column context when the engine reported one.
    pub fn friendly_message(&self) -> String {
        match (self.line, self.column) {
            (Some(line), Some(col)) => {
                format!("error on line {}, column {}: {}", line, col, self.message)
            }
            (Some(line), None) => format!("error on line {}: {}", line, self.message),
            _ => format!("script error: {}", self.message),
        }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.friendly_message())
    }
}

impl std::error::Error for ScriptError {}

pub type CanvasResult<T> = Result<T, CanvasError>;
