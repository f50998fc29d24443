//! HSL / RGB / hex color conversions.
//!
//! All conversions round to the nearest integer on output. Hue is expressed in
//! degrees `[0, 360)`, saturation and lightness in percent `[0, 100]`.

use palette::{FromColor, Srgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Color conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    /// Input did not match `#rrggbb` / `rrggbb`
    #[error("Invalid hex color: {0:?}")]
    InvalidHex(String),
}

/// 8-bit RGB triple as written to a fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
}

impl Rgb {
    /// All channels off
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    /// Initial color sent to freshly connected fixtures
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    /// Create a new RGB triple
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Scale every channel by `factor`, rounding to the nearest integer.
    ///
    /// The factor is clamped to `[0, 1]` so the result never overflows.
    pub fn scale(self, factor: f32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let channel = |c: u8| (c as f32 * factor).round() as u8;
        Self::new(channel(self.r), channel(self.g), channel(self.b))
    }

    /// Raw bytes in wire order (r, g, b)
    pub fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(bytes: [u8; 3]) -> Self {
        Self::new(bytes[0], bytes[1], bytes[2])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Hue (degrees), saturation (percent), lightness (percent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    /// Hue in degrees
    pub h: f32,
    /// Saturation in percent
    pub s: f32,
    /// Lightness in percent
    pub l: f32,
}

impl Hsl {
    /// Create a new HSL value
    pub const fn new(h: f32, s: f32, l: f32) -> Self {
        Self { h, s, l }
    }
}

impl Default for Hsl {
    /// Fully saturated red at half lightness
    fn default() -> Self {
        Self::new(0.0, 100.0, 50.0)
    }
}

/// Convert HSL to RGB.
pub fn hsl_to_rgb(hsl: Hsl) -> Rgb {
    let h = hsl.h.rem_euclid(360.0);
    let s = (hsl.s / 100.0).clamp(0.0, 1.0);
    let l = (hsl.l / 100.0).clamp(0.0, 1.0);

    if s == 0.0 {
        let v = unit_to_byte(l);
        return Rgb::new(v, v, v);
    }

    let hsl: palette::Hsl = palette::Hsl::new(h, s, l);
    let rgb: Srgb = Srgb::from_color(hsl);
    Rgb::new(
        unit_to_byte(rgb.red),
        unit_to_byte(rgb.green),
        unit_to_byte(rgb.blue),
    )
}

fn unit_to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Convert RGB to HSL. Components are rounded to whole degrees / percent;
/// the hue stays in `[0, 360)`.
pub fn rgb_to_hsl(rgb: Rgb) -> Hsl {
    let srgb: Srgb = Srgb::new(rgb.r, rgb.g, rgb.b).into_format();
    let hsl: palette::Hsl = palette::Hsl::from_color(srgb);
    let l = (hsl.lightness * 100.0).round();

    if rgb.r == rgb.g && rgb.g == rgb.b {
        // Achromatic
        return Hsl::new(0.0, 0.0, l);
    }

    let h = hsl.hue.into_positive_degrees().round() % 360.0;
    Hsl::new(h, (hsl.saturation * 100.0).round(), l)
}

/// Parse `#rrggbb` or `rrggbb` (either case).
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, ColorError> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|c| c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex(hex.to_string()));
    }

    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError::InvalidHex(hex.to_string()))
    };

    Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Format as lowercase `#rrggbb`.
pub fn rgb_to_hex(rgb: Rgb) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb.r, rgb.g, rgb.b)
}
