//! Pixel sampling and perceptual color distance.

use image::{Rgb, RgbImage, RgbaImage};
use palette::color_difference::Ciede2000;
use palette::white_point::D65;
use palette::{FromColor, Lab, Srgb};

/// Read access to the pixels of the image being decorated.
///
/// Coordinates are signed so callers can probe boxes that hang off the
/// image edge; out-of-bounds reads return `None`.
pub trait PixelSampler {
    fn dimensions(&self) -> (u32, u32);

    fn sample(&self, x: i32, y: i32) -> Option<Rgb<u8>>;
}

fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height
}

impl PixelSampler for RgbImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbImage::dimensions(self)
    }

    fn sample(&self, x: i32, y: i32) -> Option<Rgb<u8>> {
        let (w, h) = RgbImage::dimensions(self);
        in_bounds(x, y, w, h).then(|| *self.get_pixel(x as u32, y as u32))
    }
}

impl PixelSampler for RgbaImage {
    fn dimensions(&self) -> (u32, u32) {
        RgbaImage::dimensions(self)
    }

    /// Alpha is ignored; avatars are opaque.
    fn sample(&self, x: i32, y: i32) -> Option<Rgb<u8>> {
        let (w, h) = RgbaImage::dimensions(self);
        in_bounds(x, y, w, h).then(|| {
            let p = self.get_pixel(x as u32, y as u32);
            Rgb([p[0], p[1], p[2]])
        })
    }
}

/// Convert an 8-bit sRGB pixel to CIE L*a*b* (D65).
pub fn to_lab(rgb: Rgb<u8>) -> Lab<D65, f32> {
    let srgb = Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    );
    Lab::from_color(srgb)
}

/// CIEDE2000 distance between two pixels. Roughly 0 for identical colors,
/// ~2 for a just-noticeable difference, ~100 for black vs. white.
pub fn color_distance(a: Rgb<u8>, b: Rgb<u8>) -> f32 {
    to_lab(a).difference(to_lab(b))
}

/// Parse `#rrggbb` / `rrggbb` into a pixel.
pub fn parse_hex(hex: &str) -> Option<Rgb<u8>> {
    let trimmed = hex.trim().trim_start_matches('#');
    if trimmed.len() != 6 || !trimmed.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&trimmed[0..2], 16).ok()?;
    let g = u8::from_str_radix(&trimmed[2..4], 16).ok()?;
    let b = u8::from_str_radix(&trimmed[4..6], 16).ok()?;
    Some(Rgb([r, g, b]))
}
