//! Color handling for bolt styling.
//!
//! Colors are configured as HSV triples in the familiar editor units
//! (hue in degrees, saturation and value in percent) and converted to 8-bit
//! RGB once, when an edge is created.

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// HSV color: hue in degrees, saturation and value in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

impl Hsv {
    pub const fn new(h: f32, s: f32, v: f32) -> Self {
        Self { h, s, v }
    }

    /// Convert to 8-bit RGB. Hue wraps; saturation and value are clamped.
    pub fn to_rgb(self) -> Rgb {
        let h = self.h.rem_euclid(360.0);
        let s = self.s.clamp(0.0, 100.0) / 100.0;
        let v = self.v.clamp(0.0, 100.0) / 100.0;
        let c = v * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = v - c;
        let (r, g, b) = match h {
            h if h < 60.0 => (c, x, 0.0),
            h if h < 120.0 => (x, c, 0.0),
            h if h < 180.0 => (0.0, c, x),
            h if h < 240.0 => (0.0, x, c),
            h if h < 300.0 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let to_byte = |ch: f32| ((ch + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(to_byte(r), to_byte(g), to_byte(b))
    }

    /// This color with independent symmetric noise on each channel.
    pub fn jittered(self, noise: Hsv, rng: &mut impl Rng) -> Hsv {
        Hsv {
            h: self.h + rand_sym(rng, noise.h),
            s: self.s + rand_sym(rng, noise.s),
            v: self.v + rand_sym(rng, noise.v),
        }
    }
}

/// Uniform sample in `[-amp, amp)`; zero amplitude draws nothing.
pub fn rand_sym(rng: &mut impl Rng, amp: f32) -> f32 {
    if amp == 0.0 || !amp.is_finite() {
        return 0.0;
    }
    (rng.gen::<f32>() * 2.0 - 1.0) * amp
}

/// 8-bit RGB color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Normalized `0.0..=1.0` channels.
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r as f32, self.g as f32, self.b as f32) / 255.0
    }

    pub fn with_alpha(self, a: f32) -> Rgba {
        Rgba { rgb: self, a }
    }
}

/// A fill or stroke style: color plus opacity.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Rgba {
    pub rgb: Rgb,
    pub a: f32,
}

impl Rgba {
    /// CSS-style `rgba(r,g,b,a)` text, handy for logs and canvas backends.
    pub fn to_css(self) -> String {
        format!("rgba({},{},{},{})", self.rgb.r, self.rgb.g, self.rgb.b, self.a)
    }
}

/// Convert an HSV triple with every channel in `0.0..=1.0` to linear RGB.
///
/// Used for particle colors, which live in unit space rather than the
/// degree/percent units of [`Hsv`].
pub fn hsv_unit_to_rgb(hsv: Vec3) -> Vec3 {
    let k = Vec3::new(0.0, 4.0, 2.0);
    let rgb = ((Vec3::splat(hsv.x * 6.0) + k).rem_euclid(Vec3::splat(6.0)) - Vec3::splat(3.0))
        .abs()
        - Vec3::ONE;
    let rgb = rgb.clamp(Vec3::ZERO, Vec3::ONE);
    hsv.z * Vec3::ONE.lerp(rgb, hsv.y)
}

impl Rgb {
    /// Quantize normalized channels to 8 bits.
    pub fn from_vec3(c: Vec3) -> Self {
        let to_byte = |ch: f32| (ch.clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgb::new(to_byte(c.x), to_byte(c.y), to_byte(c.z))
    }
}
