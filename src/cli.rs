// ============================================================================
// PixiPaint CLI: headless rendering of drawing scripts
// ============================================================================
//
// Usage examples:
//   pixipaint --script smiley.rhai --output smiley.png
//   pixipaint -s "sprites/*.rhai" --output-dir out/ --width 32 --height 32
//   pixipaint -s tile.rhai -o tile.png --raw          (one pixel per cell)
//
// Each script gets a fresh document. The result is rendered through the
// camera (background, zoom and gridlines applied) and saved as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use image::RgbaImage;

use crate::camera::Camera;
use crate::color::parse_hex;
use crate::io::{grid_to_image, save_png};
use crate::ops::scripting::run_script_with;
use crate::project::Document;
use crate::settings::AppSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PixiPaint headless renderer.
///
/// Run Rhai drawing scripts against a blank pixel grid and save the result.
#[derive(Parser, Debug)]
#[command(
    name = "pixipaint",
    about = "PixiPaint headless pixel-art renderer",
    long_about = "Run Rhai drawing scripts against a fresh pixel grid and save the\n\
                  rendered canvas as PNG. Grid and viewport sizes default to the\n\
                  saved editor settings.\n\n\
                  Example:\n  \
                  pixipaint --script smiley.rhai --output smiley.png\n  \
                  pixipaint -s \"sprites/*.rhai\" --output-dir out/"
)]
pub struct CliArgs {
    /// Script file(s). Glob patterns accepted (e.g. "*.rhai").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Output file path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory; files are named after each script's stem.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Grid width in cells.
    #[arg(long)]
    pub width: Option<u32>,

    /// Grid height in cells.
    #[arg(long)]
    pub height: Option<u32>,

    /// Square viewport size in pixels.
    #[arg(long, value_name = "PX")]
    pub viewport: Option<u32>,

    /// Initial camera scale.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Background colour behind transparent cells (#RRGGBB).
    #[arg(long, value_name = "#RRGGBB")]
    pub background: Option<String>,

    /// Skip gridlines in the rendered output.
    #[arg(long)]
    pub no_gridlines: bool,

    /// Save the composite at one pixel per cell with alpha, skipping the camera.
    #[arg(long)]
    pub raw: bool,

    /// Settings file to use instead of the platform default.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print script console output and per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything one render needs, resolved from flags and settings.
#[derive(Clone, Debug, PartialEq)]
struct RenderOptions {
    settings: AppSettings,
    scale: f64,
    gridlines: bool,
    raw: bool,
    verbose: bool,
}

impl CliArgs {
    fn render_options(&self) -> Result<RenderOptions, String> {
        let mut settings = match &self.config {
            Some(path) => AppSettings::load_from(path),
            None => AppSettings::load(),
        };
        if let Some(w) = self.width {
            settings.grid_width = w;
        }
        if let Some(h) = self.height {
            settings.grid_height = h;
        }
        if let Some(v) = self.viewport {
            settings.viewport_width = v;
            settings.viewport_height = v;
        }
        if let Some(bg) = &self.background {
            settings.background =
                parse_hex(bg).ok_or_else(|| format!("invalid background colour '{}'", bg))?;
        }
        if settings.grid_width == 0 || settings.grid_height == 0 {
            return Err("grid dimensions must be positive".to_string());
        }
        if self.scale.is_nan() || self.scale <= 0.0 {
            return Err(format!("scale must be positive, got {}", self.scale));
        }
        Ok(RenderOptions {
            gridlines: settings.show_gridlines && !self.no_gridlines,
            scale: settings.clamp_scale(self.scale),
            settings,
            raw: self.raw,
            verbose: self.verbose,
        })
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all scripts succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.script);
    if inputs.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let options = match args.render_options() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(script_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", script_path.display());
            any_failure = true;
            continue;
        };

        match run_one(idx + 1, script_path, &output_path, &options) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("{}: {}", script_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-script pipeline
// ============================================================================

fn run_one(counter: usize, script: &Path, output: &Path, options: &RenderOptions) -> Result<(), String> {
    let source = std::fs::read_to_string(script)
        .map_err(|e| format!("could not read script '{}': {}", script.display(), e))?;

    let s = &options.settings;
    let document = Document::new_untitled(counter, s.grid_width, s.grid_height);
    let camera = Camera::new(
        s.grid_width,
        s.grid_height,
        0.0,
        0.0,
        s.viewport_width,
        s.viewport_height,
        options.scale,
    );

    let outcome = run_script_with(&source, document, camera, s).map_err(|e| e.friendly_message())?;
    if options.verbose {
        for line in &outcome.console_output {
            println!("  [script] {}", line);
        }
    }

    let mut document = outcome.document;
    let image = if options.raw {
        grid_to_image(document.canvas.composited())
    } else {
        let mut camera = outcome.camera;
        let (w, h) = camera.viewport();
        let (sw, sh) = camera.scaled_size();
        let mut surface = RgbaImage::new(w.max(sw), h.max(sh));
        camera.draw(&mut surface, &mut document.canvas, s.background, options.gridlines);
        surface
    };

    save_png(&image, output).map_err(|e| format!("save failed: {}", e))?;
    document.set_path(output.to_path_buf());
    document.mark_clean();
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand each argument (an existing path or a glob) into script paths,
/// keeping first-seen order and dropping repeats.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut inputs: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let found: Vec<PathBuf> = if Path::new(pattern).exists() {
            vec![PathBuf::from(pattern)]
        } else {
            match glob::glob(pattern) {
                Ok(paths) => paths.filter_map(Result::ok).collect(),
                Err(e) => {
                    eprintln!("warning: invalid glob '{}': {}", pattern, e);
                    continue;
                }
            }
        };

        if found.is_empty() {
            eprintln!("warning: pattern '{}' matched no files.", pattern);
        }
        for path in found {
            if !inputs.contains(&path) {
                inputs.push(path);
            }
        }
    }

    inputs
}

/// Output path for one script.
///
/// Priority:
/// 1. `--output` (explicit path, single script)
/// 2. `--output-dir` (file named after the script stem)
/// 3. Fallback: next to the script, same stem, `.png`
fn build_output_path(script: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = script.file_stem()?.to_string_lossy().into_owned();
    let file_name = format!("{}.png", stem);

    if let Some(dir) = output_dir {
        return Some(dir.join(file_name));
    }

    let parent = script.parent().unwrap_or(Path::new("."));
    Some(parent.join(file_name))
}
