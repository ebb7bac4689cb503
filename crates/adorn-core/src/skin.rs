//! Skin-tone validation for candidate sticker placements.
//!
//! An area that is mostly not skin-colored is already covered by hair, an
//! existing feature or an earlier overlay and should not receive a sticker.

use crate::color::{color_distance, PixelSampler};
use crate::error::PlacementError;
use crate::face::LandmarkSet;
use crate::types::{BoundingBox, ImageSize, LandmarkType, NormPoint, Side};
use image::Rgb;
use serde::{Deserialize, Serialize};

/// Where the bare-skin reference pixel was taken and its color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinReference {
    pub x: i32,
    pub y: i32,
    pub color: Rgb<u8>,
}

/// Pixel location of the skin reference on the camera-facing `side`:
/// the nose wing's X and the mouth corner's Y.
pub fn reference_point(
    landmarks: &LandmarkSet,
    size: ImageSize,
    side: Side,
) -> Result<(i32, i32), PlacementError> {
    let (nose, mouth) = match side {
        Side::Left => (LandmarkType::NoseLeft, LandmarkType::MouthLeft),
        Side::Right => (LandmarkType::NoseRight, LandmarkType::MouthRight),
    };
    let x = landmarks.require(nose)?.x;
    let y = landmarks.require(mouth)?.y;
    let (px, py) = size.scale(NormPoint::new(x, y));
    Ok((px.round() as i32, py.round() as i32))
}

/// Sample the skin reference. `Ok(None)` when the point is off-image.
pub fn sample_reference(
    sampler: &dyn PixelSampler,
    landmarks: &LandmarkSet,
    size: ImageSize,
    side: Side,
) -> Result<Option<SkinReference>, PlacementError> {
    let (x, y) = reference_point(landmarks, size, side)?;
    Ok(sampler.sample(x, y).map(|color| SkinReference { x, y, color }))
}

/// Outcome of scanning one candidate box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkinScan {
    pub bbox: BoundingBox,
    pub breaching: u64,
    pub total: u64,
}

impl SkinScan {
    pub fn ratio(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.breaching as f32 / self.total as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkinToneValidator {
    /// CIEDE2000 distance above which a pixel is not skin.
    pub distance_threshold: f32,
    /// Largest tolerated fraction of non-skin pixels.
    pub max_breach_ratio: f32,
}

impl Default for SkinToneValidator {
    fn default() -> Self {
        Self {
            distance_threshold: 15.0,
            max_breach_ratio: 0.1,
        }
    }
}

impl SkinToneValidator {
    /// Compare every pixel under `bbox` against `reference`.
    ///
    /// Pixels outside the image count as breaching.
    pub fn scan(&self, sampler: &dyn PixelSampler, reference: Rgb<u8>, bbox: BoundingBox) -> SkinScan {
        let mut breaching = 0u64;
        let mut total = 0u64;
        for (x, y) in bbox.pixels() {
            total += 1;
            let is_skin = sampler
                .sample(x, y)
                .is_some_and(|px| color_distance(reference, px) <= self.distance_threshold);
            if !is_skin {
                breaching += 1;
            }
        }
        SkinScan { bbox, breaching, total }
    }

    pub fn accepts(&self, scan: &SkinScan) -> bool {
        scan.ratio() <= self.max_breach_ratio
    }

    pub fn validate(&self, sampler: &dyn PixelSampler, reference: Rgb<u8>, bbox: BoundingBox) -> bool {
        let scan = self.scan(sampler, reference, bbox);
        self.accepts(&scan)
    }
}
