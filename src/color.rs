// ============================================================================
// COLOR MODEL – Porter-Duff "over", RGB flattening, HSV, distances
// ============================================================================

use image::{Pixel, Rgb, Rgba};

use crate::error::{CanvasError, CanvasResult};

/// Fully transparent black; the value of every untouched cell.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub const HUE_MAX: u16 = 360;
pub const SATURATION_MAX: u8 = 100;
pub const VALUE_MAX: u8 = 100;

/// Round-half-up on non-negative values ("add 0.5, truncate").
#[inline(always)]
fn round_half_up(v: f64) -> u8 {
    (v + 0.5).clamp(0.0, 255.0) as u8
}

/// Porter-Duff "`top` over `bottom`" on straight (non-premultiplied) RGBA.
pub fn blend_over(top: Rgba<u8>, bottom: Rgba<u8>) -> Rgba<u8> {
    let a1 = top[3] as f64 / 255.0;
    let a2 = bottom[3] as f64 / 255.0;
    let out_a = a1 + a2 * (1.0 - a1);

    if out_a == 0.0 {
        return TRANSPARENT;
    }

    let channel = |i: usize| -> u8 {
        round_half_up((top[i] as f64 * a1 + bottom[i] as f64 * a2 * (1.0 - a1)) / out_a)
    };

    Rgba([
        channel(0),
        channel(1),
        channel(2),
        round_half_up(out_a * 255.0),
    ])
}

/// Flatten `rgba` onto an opaque `background`, dropping alpha.
pub fn to_rgb(rgba: Rgba<u8>, background: Rgb<u8>) -> Rgb<u8> {
    let out = blend_over(rgba, background.to_rgba());
    Rgb([out[0], out[1], out[2]])
}

/// `0xRRGGBB` encoding handed to renderers that want packed pixels.
pub fn to_packed_int(rgb: Rgb<u8>) -> u32 {
    ((rgb[0] as u32) << 16) | ((rgb[1] as u32) << 8) | rgb[2] as u32
}

/// `#rrggbb` for any 8-bit RGB or RGBA pixel (alpha is ignored).
pub fn to_hex<P: Pixel<Subpixel = u8>>(color: &P) -> String {
    let c = color.channels();
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

/// Parse `#rrggbb` / `rrggbb` into an RGB triple.
pub fn parse_hex(s: &str) -> Option<Rgb<u8>> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb([r, g, b]))
}

/// Euclidean distance over all four channels, alpha included.
pub fn color_distance(c1: Rgba<u8>, c2: Rgba<u8>) -> f64 {
    c1.0.iter()
        .zip(c2.0.iter())
        .map(|(&a, &b)| {
            let d = a as f64 - b as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Validate four wide integers as an RGBA color.
pub fn rgba_from_ints(channels: [i64; 4]) -> CanvasResult<Rgba<u8>> {
    let mut out = [0u8; 4];
    for (dst, &value) in out.iter_mut().zip(channels.iter()) {
        *dst = u8::try_from(value).map_err(|_| CanvasError::Range { value })?;
    }
    Ok(Rgba(out))
}

// ============================================================================
// HSV
// ============================================================================

/// Hue in degrees `0..=360`, saturation and value in percent `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Hsv {
    pub hue: u16,
    pub saturation: u8,
    pub value: u8,
}

impl Hsv {
    pub fn new(hue: u16, saturation: u8, value: u8) -> Self {
        Self {
            hue: hue.min(HUE_MAX),
            saturation: saturation.min(SATURATION_MAX),
            value: value.min(VALUE_MAX),
        }
    }
}

/// Six-sector HSV → RGB; `alpha` is passed through untouched.
pub fn hsv_to_rgba(hsv: Hsv, alpha: u8) -> Rgba<u8> {
    let s = hsv.saturation.min(SATURATION_MAX) as f64 / SATURATION_MAX as f64;
    let v = hsv.value.min(VALUE_MAX) as f64 / VALUE_MAX as f64;
    let h6 = (hsv.hue % HUE_MAX) as f64 / 60.0;

    let c = v * s;
    let x = c * (1.0 - ((h6 % 2.0) - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h6 as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgba([
        round_half_up((r + m) * 255.0),
        round_half_up((g + m) * 255.0),
        round_half_up((b + m) * 255.0),
        alpha,
    ])
}

/// RGB(A) → HSV; alpha is ignored. Greys report hue 0.
pub fn rgba_to_hsv(rgba: Rgba<u8>) -> Hsv {
    let r = rgba[0] as f64 / 255.0;
    let g = rgba[1] as f64 / 255.0;
    let b = rgba[2] as f64 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    Hsv {
        hue: ((hue + 0.5) as u16) % HUE_MAX,
        saturation: (saturation * SATURATION_MAX as f64 + 0.5) as u8,
        value: (max * VALUE_MAX as f64 + 0.5) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_top_hides_half_transparent_bottom() {
        let out = blend_over(Rgba([0, 255, 0, 255]), Rgba([255, 0, 0, 128]));
        assert_eq!(out, Rgba([0, 255, 0, 255]));
    }

    #[test]
    fn transparent_is_identity_in_both_positions() {
        for c in [Rgba([10, 20, 30, 255]), Rgba([200, 100, 50, 77]), Rgba([1, 2, 3, 1])] {
            assert_eq!(blend_over(c, TRANSPARENT), c);
            assert_eq!(blend_over(TRANSPARENT, c), c);
        }
        assert_eq!(blend_over(TRANSPARENT, TRANSPARENT), TRANSPARENT);
    }

    #[test]
    fn half_red_over_opaque_blue() {
        // a1 = 128/255, out_a = 1
        let out = blend_over(Rgba([255, 0, 0, 128]), Rgba([0, 0, 255, 255]));
        assert_eq!(out, Rgba([128, 0, 127, 255]));
    }

    #[test]
    fn to_rgb_flattens_against_background() {
        assert_eq!(to_rgb(TRANSPARENT, Rgb([255, 255, 255])), Rgb([255, 255, 255]));
        assert_eq!(to_rgb(Rgba([9, 8, 7, 255]), Rgb([255, 255, 255])), Rgb([9, 8, 7]));
        assert_eq!(to_rgb(Rgba([0, 0, 0, 128]), Rgb([255, 255, 255])), Rgb([127, 127, 127]));
    }

    #[test]
    fn packed_and_hex_encodings() {
        assert_eq!(to_packed_int(Rgb([0x12, 0x34, 0x56])), 0x123456);
        assert_eq!(to_hex(&Rgb([255, 0, 16])), "#ff0010");
        assert_eq!(to_hex(&Rgba([1, 2, 3, 0])), "#010203");
        assert_eq!(parse_hex("#ff0010"), Some(Rgb([255, 0, 16])));
        assert_eq!(parse_hex("zz0010"), None);
        assert_eq!(parse_hex("#fff"), None);
    }

    #[test]
    fn distance_counts_alpha() {
        assert_eq!(color_distance(TRANSPARENT, TRANSPARENT), 0.0);
        assert_eq!(color_distance(Rgba([0, 0, 0, 0]), Rgba([0, 0, 0, 255])), 255.0);
        assert_eq!(color_distance(Rgba([3, 4, 0, 0]), TRANSPARENT), 5.0);
    }

    #[test]
    fn channel_range_is_validated() {
        assert_eq!(rgba_from_ints([1, 2, 3, 255]), Ok(Rgba([1, 2, 3, 255])));
        assert_eq!(rgba_from_ints([256, 0, 0, 0]), Err(CanvasError::Range { value: 256 }));
        assert_eq!(rgba_from_ints([0, -1, 0, 0]), Err(CanvasError::Range { value: -1 }));
    }

    #[test]
    fn primary_hues() {
        assert_eq!(hsv_to_rgba(Hsv::new(0, 100, 100), 255), Rgba([255, 0, 0, 255]));
        assert_eq!(hsv_to_rgba(Hsv::new(120, 100, 100), 9), Rgba([0, 255, 0, 9]));
        assert_eq!(hsv_to_rgba(Hsv::new(240, 100, 100), 255), Rgba([0, 0, 255, 255]));
        assert_eq!(hsv_to_rgba(Hsv::new(360, 100, 100), 255), Rgba([255, 0, 0, 255]));
        assert_eq!(rgba_to_hsv(Rgba([255, 0, 0, 255])), Hsv::new(0, 100, 100));
        assert_eq!(rgba_to_hsv(Rgba([0, 0, 0, 0])), Hsv::new(0, 0, 0));
        assert_eq!(rgba_to_hsv(Rgba([255, 255, 255, 255])), Hsv::new(0, 0, 100));
    }

    #[test]
    fn interior_hsv_round_trips_within_one_unit() {
        let samples = [
            Hsv::new(240, 50, 50),
            Hsv::new(30, 80, 90),
            Hsv::new(200, 40, 70),
            Hsv::new(300, 60, 60),
            Hsv::new(75, 90, 40),
        ];
        for hsv in samples {
            let back = rgba_to_hsv(hsv_to_rgba(hsv, 255));
            assert!((back.hue as i32 - hsv.hue as i32).abs() <= 1, "{hsv:?} -> {back:?}");
            assert!((back.saturation as i32 - hsv.saturation as i32).abs() <= 1, "{hsv:?} -> {back:?}");
            assert!((back.value as i32 - hsv.value as i32).abs() <= 1, "{hsv:?} -> {back:?}");
        }
    }
}
