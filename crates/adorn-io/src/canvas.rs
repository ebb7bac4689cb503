//! Image compositing: stacks planned sticker layers onto the avatar and
//! optionally draws debugging indicators.

use crate::error::IoError;
use adorn_core::{CompositeInstruction, ImageSize, LandmarkSet, LandmarkType, ScanArea};
use image::{imageops, DynamicImage, ImageFormat, Pixel, Rgba, RgbaImage};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Tint laid over each skin-scanned area (#10f70c at 10% opacity).
const SCAN_TINT: Rgba<u8> = Rgba([16, 247, 12, 26]);
const REFERENCE_MARKER: Rgba<u8> = Rgba([0, 0, 0, 255]);
const REFERENCE_MARKER_SIZE: u32 = 10;
const LANDMARK_MARKER_SIZE: u32 = 20;

pub fn load_image(path: &Path) -> Result<RgbaImage, IoError> {
    let img = image::open(path).map_err(|e| IoError::image(path, e))?;
    Ok(img.into_rgba8())
}

pub fn image_size(img: &RgbaImage) -> ImageSize {
    ImageSize::new(img.width(), img.height())
}

/// Write `img`, dropping alpha for formats that cannot store it.
pub fn save_image(img: RgbaImage, path: &Path) -> Result<(), IoError> {
    let format = ImageFormat::from_path(path).map_err(|e| IoError::image(path, e))?;
    let result = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgba8(img).into_rgb8().save_with_format(path, format),
        _ => img.save_with_format(path, format),
    };
    result.map_err(|e| IoError::image(path, e))
}

/// Decoded sticker art, loaded once per path.
#[derive(Default)]
pub struct StickerCache {
    stickers: HashMap<PathBuf, RgbaImage>,
}

impl StickerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &Path) -> Result<&RgbaImage, IoError> {
        if !self.stickers.contains_key(path) {
            let sticker = load_image(path)?;
            self.stickers.insert(path.to_path_buf(), sticker);
        }
        self.stickers
            .get(path)
            .ok_or_else(|| IoError::fs(path, std::io::ErrorKind::NotFound.into()))
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }
}

/// Alpha-composite each instruction onto `base`, in order.
///
/// Stickers hanging past the image edge are clipped.
pub fn composite(
    base: &mut RgbaImage,
    instructions: &[CompositeInstruction],
    stickers: &mut StickerCache,
) -> Result<(), IoError> {
    for inst in instructions {
        let sticker = stickers.get(&inst.input)?;
        imageops::overlay(base, sticker, inst.left as i64, inst.top as i64);
    }
    Ok(())
}

fn blend_rect(base: &mut RgbaImage, left: i64, top: i64, width: u32, height: u32, color: Rgba<u8>) {
    let (w, h) = base.dimensions();
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = (left + width as i64).min(w as i64);
    let y1 = (top + height as i64).min(h as i64);
    for y in y0..y1 {
        for x in x0..x1 {
            if color[3] == u8::MAX {
                base.put_pixel(x as u32, y as u32, color);
            } else {
                base.get_pixel_mut(x as u32, y as u32).blend(&color);
            }
        }
    }
}

fn light_color<R: Rng + ?Sized>(rng: &mut R) -> Rgba<u8> {
    Rgba([rng.gen_range(128..=255), rng.gen_range(128..=255), rng.gen_range(128..=255), 255])
}

/// Draw debugging indicators: a translucent tint over every skin-scanned
/// area, a black marker on each skin reference pixel, and a randomly colored
/// square on every landmark.
///
/// Returns the color picked for each landmark.
pub fn draw_indicators<R: Rng + ?Sized>(
    base: &mut RgbaImage,
    scans: &[ScanArea],
    landmarks: &LandmarkSet,
    rng: &mut R,
) -> BTreeMap<LandmarkType, Rgba<u8>> {
    for scan in scans {
        let b = scan.bbox;
        blend_rect(base, b.left as i64, b.top as i64, b.width, b.height, SCAN_TINT);
        let half = (REFERENCE_MARKER_SIZE / 2) as i64;
        let (rx, ry) = scan.reference;
        blend_rect(
            base,
            rx as i64 - half,
            ry as i64 - half,
            REFERENCE_MARKER_SIZE,
            REFERENCE_MARKER_SIZE,
            REFERENCE_MARKER,
        );
    }

    let size = image_size(base);
    let half = (LANDMARK_MARKER_SIZE / 2) as i64;
    let mut colors = BTreeMap::new();
    for (kind, point) in landmarks.iter() {
        let color = light_color(rng);
        let (x, y) = size.to_pixel(point);
        blend_rect(
            base,
            x as i64 - half,
            y as i64 - half,
            LANDMARK_MARKER_SIZE,
            LANDMARK_MARKER_SIZE,
            color,
        );
        colors.insert(kind, color);
    }
    tracing::debug!(landmarks = colors.len(), scans = scans.len(), "indicators drawn");
    colors
}
