use image::Rgba;

use crate::color::{HUE_MAX, Hsv, SATURATION_MAX, VALUE_MAX, hsv_to_rgba, rgba_to_hsv};

/// Clicks this close (in percent) to the SV square's edges snap to 0 / 100.
pub const COLOR_PICKER_TOLERANCE: u8 = 3;
/// Clicks this close (in degrees) to either end of the hue strip snap to 0 / 360.
pub const HUE_PICKER_TOLERANCE: u16 = 3;

/// HSV colour-selection state: a saturation/value square with a hue strip
/// below it. The Eyedropper writes into this.
#[derive(Clone, Debug)]
pub struct ColorSelector {
    pub x: f64,
    pub y: f64,
    pub size: (f64, f64),
    pub hue_picker_height: f64,
    pub hue_picker_padding: f64,
    hue: u16,
    sat: u8,
    val: u8,
    color: Rgba<u8>,
}

impl Default for ColorSelector {
    fn default() -> Self {
        Self::new(0.0, 0.0, (100.0, 100.0))
    }
}

impl ColorSelector {
    pub fn new(x: f64, y: f64, size: (f64, f64)) -> Self {
        Self {
            x,
            y,
            size,
            hue_picker_height: 10.0,
            hue_picker_padding: 5.0,
            hue: 0,
            sat: 0,
            val: 0,
            color: Rgba([0, 0, 0, 255]),
        }
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn hsv(&self) -> Hsv {
        Hsv::new(self.hue, self.sat, self.val)
    }

    /// Out-of-range hues are ignored.
    pub fn set_hue(&mut self, hue: u16) {
        if hue > HUE_MAX {
            return;
        }
        self.hue = hue;
        self.color = hsv_to_rgba(self.hsv(), self.color[3]);
    }

    pub fn set_hsv(&mut self, hsv: Hsv) {
        self.hue = hsv.hue;
        self.sat = hsv.saturation;
        self.val = hsv.value;
        self.color = hsv_to_rgba(hsv, 255);
    }

    /// Adopt a sampled colour exactly (alpha included) and derive HSV from it.
    pub fn set_from_rgba(&mut self, rgba: Rgba<u8>) {
        let hsv = rgba_to_hsv(rgba);
        self.hue = hsv.hue;
        self.sat = hsv.saturation;
        self.val = hsv.value;
        self.color = rgba;
    }

    /// Handle a click at screen `(px, py)`.
    ///
    /// Returns the new colour when the click landed on the hue strip or the
    /// SV square, `None` otherwise.
    pub fn click(&mut self, px: f64, py: f64) -> Option<Rgba<u8>> {
        let x = px - self.x;
        let y = py - self.y;
        let (w, h) = self.size;

        let strip_top = h + self.hue_picker_padding;
        if y > strip_top && y < strip_top + self.hue_picker_height && (0.0..=w).contains(&x) {
            let mut hue = ((x / w) * HUE_MAX as f64).round() as u16;
            if hue <= HUE_PICKER_TOLERANCE {
                hue = 0;
            } else if hue >= HUE_MAX - HUE_PICKER_TOLERANCE {
                hue = HUE_MAX;
            }
            self.set_hue(hue);
            return Some(self.color);
        }

        if !(0.0..=w).contains(&x) || !(0.0..=h).contains(&y) {
            return None;
        }

        let s = snap_percent(((x / w) * SATURATION_MAX as f64).round() as u8, SATURATION_MAX);
        let v = snap_percent((((h - y) / h) * VALUE_MAX as f64).round() as u8, VALUE_MAX);
        self.set_hsv(Hsv::new(self.hue, s, v));
        Some(self.color)
    }
}

fn snap_percent(v: u8, max: u8) -> u8 {
    if v >= max - COLOR_PICKER_TOLERANCE {
        max
    } else if v <= COLOR_PICKER_TOLERANCE {
        0
    } else {
        v
    }
}
