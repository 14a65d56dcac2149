//! Color value types and their fixed 3-byte wire encodings.
//!
//! Wire encodings are lossy: HSV components are quantized to one byte each
//! (hue scaled so 0..=255 spans 0..360 degrees), so a round trip lands within
//! one byte step of the original rather than on it.

use serde::{Deserialize, Serialize};

/// Bytes per color record on the wire
pub const COLOR_WIRE_LEN: usize = 3;

/// Degrees of hue per wire byte step
pub const HUE_STEP_DEGREES: f32 = 360.0 / 255.0;

/// Colors with a fixed-size wire form
pub trait WireColor: Copy {
    fn to_wire(&self) -> [u8; COLOR_WIRE_LEN];
    fn from_wire(bytes: [u8; COLOR_WIRE_LEN]) -> Self;
}

/// Hue in [0, 360), saturation and value in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: f32,
    pub saturation: f32,
    pub value: f32,
}

impl Hsv {
    /// Normalizes hue into [0, 360) and clamps the other components;
    /// non-finite components become 0.
    pub fn new(hue: f32, saturation: f32, value: f32) -> Self {
        let finite_or_zero = |x: f32| if x.is_finite() { x } else { 0.0 };
        Self {
            hue: finite_or_zero(hue).rem_euclid(360.0),
            saturation: finite_or_zero(saturation).clamp(0.0, 1.0),
            value: finite_or_zero(value).clamp(0.0, 1.0),
        }
    }

    pub fn to_rgb(&self) -> Rgb {
        let c = self.value * self.saturation;
        let sector = self.hue / 60.0;
        let x = c * (1.0 - (sector % 2.0 - 1.0).abs());
        let m = self.value - c;

        let (r, g, b) = match sector as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };

        let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(to_byte(r), to_byte(g), to_byte(b))
    }
}

impl WireColor for Hsv {
    fn to_wire(&self) -> [u8; COLOR_WIRE_LEN] {
        let hue = (self.hue * 255.0 / 360.0).round().clamp(0.0, 255.0) as u8;
        let sat = (self.saturation * 255.0).round().clamp(0.0, 255.0) as u8;
        let val = (self.value * 255.0).round().clamp(0.0, 255.0) as u8;
        [hue, sat, val]
    }

    fn from_wire(bytes: [u8; COLOR_WIRE_LEN]) -> Self {
        Hsv::new(
            bytes[0] as f32 * HUE_STEP_DEGREES,
            bytes[1] as f32 / 255.0,
            bytes[2] as f32 / 255.0,
        )
    }
}

/// 8-bit RGB triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hsv(&self) -> Hsv {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };
        let saturation = if max == 0.0 { 0.0 } else { delta / max };

        Hsv::new(hue, saturation, max)
    }
}

impl WireColor for Rgb {
    fn to_wire(&self) -> [u8; COLOR_WIRE_LEN] {
        [self.r, self.g, self.b]
    }

    fn from_wire(bytes: [u8; COLOR_WIRE_LEN]) -> Self {
        Rgb::new(bytes[0], bytes[1], bytes[2])
    }
}

impl From<Hsv> for Rgb {
    fn from(hsv: Hsv) -> Self {
        hsv.to_rgb()
    }
}
