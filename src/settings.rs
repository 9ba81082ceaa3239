use image::Rgb;
use std::path::{Path, PathBuf};

use crate::color::{parse_hex, to_hex};
use crate::components::tools::BrushType;

/// Persistent editor preferences, stored as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    pub grid_width: u32,
    pub grid_height: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub background: Rgb<u8>,
    pub show_gridlines: bool,
    pub brush_radius: u32,
    pub brush_type: BrushType,
    pub fill_tolerance: f64,
    /// Multiplier applied per wheel notch.
    pub zoom_step: f64,
    pub min_scale: f64,
    pub max_scale: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            grid_width: 16,
            grid_height: 16,
            viewport_width: 320,
            viewport_height: 320,
            background: Rgb([255, 255, 255]),
            show_gridlines: true,
            brush_radius: 0,
            brush_type: BrushType::Circle,
            fill_tolerance: 0.0,
            zoom_step: 1.1,
            min_scale: 0.1,
            max_scale: 20.0,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/pixipaint/pixipaint_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PixiPaint\pixipaint_settings.cfg
    /// On macOS:   ~/Library/Application Support/PixiPaint/pixipaint_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("PixiPaint").join("pixipaint_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("PixiPaint")
                    .join("pixipaint_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("pixipaint").join("pixipaint_settings.cfg"))
        }
    }

    /// Load from the platform path, falling back to defaults.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Save to the platform path. Failures are logged, never fatal.
    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            crate::log_warn!("could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())
    }

    /// Parse `key=value` lines. Unknown keys, comments and bad values are
    /// skipped, leaving the default for that key.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "grid_width" => set_parsed(&mut s.grid_width, val, |v: &u32| *v > 0),
                "grid_height" => set_parsed(&mut s.grid_height, val, |v: &u32| *v > 0),
                "viewport_width" => set_parsed(&mut s.viewport_width, val, |v: &u32| *v > 0),
                "viewport_height" => set_parsed(&mut s.viewport_height, val, |v: &u32| *v > 0),
                "background" => {
                    if let Some(c) = parse_hex(val) {
                        s.background = c;
                    }
                }
                "show_gridlines" => s.show_gridlines = val == "true",
                "brush_radius" => set_parsed(&mut s.brush_radius, val, |_| true),
                "brush_type" => s.brush_type = BrushType::from_name(val),
                "fill_tolerance" => set_parsed(&mut s.fill_tolerance, val, |v: &f64| *v >= 0.0),
                "zoom_step" => set_parsed(&mut s.zoom_step, val, |v: &f64| *v > 1.0),
                "min_scale" => set_parsed(&mut s.min_scale, val, |v: &f64| *v > 0.0),
                "max_scale" => set_parsed(&mut s.max_scale, val, |v: &f64| *v > 0.0),
                _ => {}
            }
        }
        if s.min_scale > s.max_scale {
            std::mem::swap(&mut s.min_scale, &mut s.max_scale);
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("grid_width={}\n", self.grid_width));
        out.push_str(&format!("grid_height={}\n", self.grid_height));
        out.push_str(&format!("viewport_width={}\n", self.viewport_width));
        out.push_str(&format!("viewport_height={}\n", self.viewport_height));
        out.push_str(&format!("background={}\n", to_hex(&self.background)));
        out.push_str(&format!("show_gridlines={}\n", self.show_gridlines));
        out.push_str(&format!("brush_radius={}\n", self.brush_radius));
        out.push_str(&format!("brush_type={}\n", self.brush_type.label()));
        out.push_str(&format!("fill_tolerance={}\n", self.fill_tolerance));
        out.push_str(&format!("zoom_step={}\n", self.zoom_step));
        out.push_str(&format!("min_scale={}\n", self.min_scale));
        out.push_str(&format!("max_scale={}\n", self.max_scale));
        out
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str, valid: impl Fn(&T) -> bool) {
    if let Ok(v) = val.parse::<T>()
        && valid(&v)
    {
        *slot = v;
    }
}
