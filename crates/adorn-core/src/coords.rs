//! Landmark coordinate resolver.
//!
//! Converts normalized detector landmarks into one pixel anchor per
//! [`Region`]. All derivations run in normalized space and are scaled to
//! pixels only at the end.

use crate::color::{color_distance, PixelSampler};
use crate::error::PlacementError;
use crate::face::LandmarkSet;
use crate::types::{ImageSize, LandmarkType as L, NormPoint, Region, RegionPoint, Side};
use image::Rgb;
use std::collections::BTreeMap;

/// Fraction of the way from the upper to the lower lip.
const MOUTH_FRACTION: f32 = 5.0 / 8.0;
/// Fraction of the way from the jawline midpoint to the mouth corner.
const CHIN_FRACTION: f32 = 5.0 / 8.0;
/// Fraction of the way from the jawline midpoint to the chin bottom.
const NECK_FRACTION: f32 = 0.25;
/// Drop below the lower lid, in normalized units.
const EYE_DROP: f32 = 0.06;
/// Lift above the top of the eyebrow, in normalized units.
const FOREHEAD_LIFT: f32 = 0.138;

/// Tunables for the resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Reference lip color used to refine the mouth anchor.
    pub mouth_color: Rgb<u8>,
    /// Half-width in pixels of the vertical band scanned between the lips.
    pub mouth_band_half_width: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            mouth_color: Rgb([150, 70, 72]),
            mouth_band_half_width: 2,
        }
    }
}

type Derivation = fn(&CoordinateResolver<'_>) -> Result<NormPoint, PlacementError>;

/// Resolves region anchors for one face in one image.
pub struct CoordinateResolver<'a> {
    size: ImageSize,
    landmarks: &'a LandmarkSet,
    sampler: Option<&'a dyn PixelSampler>,
    config: ResolverConfig,
}

impl<'a> CoordinateResolver<'a> {
    pub fn new(size: ImageSize, landmarks: &'a LandmarkSet) -> Self {
        Self {
            size,
            landmarks,
            sampler: None,
            config: ResolverConfig::default(),
        }
    }

    /// Enable pixel-based refinement (currently the mouth anchor).
    pub fn with_sampler(mut self, sampler: &'a dyn PixelSampler) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Resolve the anchor for `region`.
    ///
    /// `Ok(None)` means the region is legitimately unavailable (its anchor
    /// falls outside the image). A required landmark that is absent is an error.
    pub fn resolve(&self, region: Region) -> Result<Option<RegionPoint>, PlacementError> {
        let norm = derivation(region)(self)?;
        let (x, y) = self.size.to_pixel(norm);
        if !self.size.contains(x, y) {
            tracing::debug!(%region, x, y, "region anchor outside image");
            return Ok(None);
        }
        let mut point = RegionPoint { region, x, y };
        if region == Region::Mouth {
            if let Some(sampler) = self.sampler {
                point.y = self.refine_mouth_y(sampler, point.x, point.y)?;
            }
        }
        Ok(Some(point))
    }

    /// Resolve every region, omitting unavailable ones.
    pub fn resolve_all(&self) -> Result<BTreeMap<Region, RegionPoint>, PlacementError> {
        let mut out = BTreeMap::new();
        for region in Region::ALL {
            if let Some(point) = self.resolve(region)? {
                out.insert(region, point);
            }
        }
        Ok(out)
    }

    pub fn mouth(&self) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(Region::Mouth)
    }

    pub fn nose(&self) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(Region::Nose)
    }

    pub fn glabella(&self) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(Region::Glabella)
    }

    pub fn eye(&self, side: Side) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(match side {
            Side::Left => Region::EyeLeft,
            Side::Right => Region::EyeRight,
        })
    }

    pub fn chin(&self, side: Side) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(match side {
            Side::Left => Region::ChinLeft,
            Side::Right => Region::ChinRight,
        })
    }

    pub fn cheek(&self, side: Side) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(match side {
            Side::Left => Region::CheekLeft,
            Side::Right => Region::CheekRight,
        })
    }

    pub fn forehead(&self, side: Side) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(match side {
            Side::Left => Region::ForeheadLeft,
            Side::Right => Region::ForeheadRight,
        })
    }

    pub fn neck(&self, side: Side) -> Result<Option<RegionPoint>, PlacementError> {
        self.resolve(match side {
            Side::Left => Region::NeckLeft,
            Side::Right => Region::NeckRight,
        })
    }

    /// Horizontal jawline span in pixels, or the image width when the
    /// jawline landmarks are absent.
    pub fn face_width(&self) -> f32 {
        match (self.landmarks.get(L::MidJawlineLeft), self.landmarks.get(L::MidJawlineRight)) {
            (Some(l), Some(r)) if (r.x - l.x).abs() > f32::EPSILON => {
                (r.x - l.x).abs() * self.size.width as f32
            }
            _ => self.size.width as f32,
        }
    }

    fn get(&self, kind: L) -> Result<NormPoint, PlacementError> {
        self.landmarks.require(kind)
    }

    fn mouth_norm(&self) -> Result<NormPoint, PlacementError> {
        let up = self.get(L::MouthUp)?;
        let down = self.get(L::MouthDown)?;
        Ok(up.lerp(down, MOUTH_FRACTION))
    }

    fn nose_norm(&self) -> Result<NormPoint, PlacementError> {
        self.get(L::Nose)
    }

    fn glabella_norm(&self) -> Result<NormPoint, PlacementError> {
        let eye_left = self.get(L::EyeLeft)?;
        let eye_right = self.get(L::EyeRight)?;
        let left = eye_left.midpoint(self.get(L::LeftEyeBrowRight)?);
        let right = eye_right.midpoint(self.get(L::RightEyeBrowLeft)?);

        // Use the flatter brow's offset so a raised brow doesn't drag the point up.
        let left_offset = left.y - eye_left.y;
        let right_offset = right.y - eye_right.y;
        let offset = if left_offset.abs() <= right_offset.abs() {
            left_offset
        } else {
            right_offset
        };
        let eye_y = (eye_left.y + eye_right.y) / 2.0;

        Ok(NormPoint::new((left.x + right.x) / 2.0, eye_y + offset))
    }

    fn eye_norm(&self, corner: L, lower_lid: L) -> Result<NormPoint, PlacementError> {
        let corner = self.get(corner)?;
        let lid = self.get(lower_lid)?;
        Ok(NormPoint::new(corner.x, lid.y + EYE_DROP))
    }

    fn chin_norm(&self, jaw: L, mouth_corner: L) -> Result<NormPoint, PlacementError> {
        let jaw = self.get(jaw)?;
        let corner = self.get(mouth_corner)?;
        Ok(jaw.lerp(corner, CHIN_FRACTION))
    }

    fn cheek_norm(&self, jaw: L, mouth_corner: L, eye_corner: L) -> Result<NormPoint, PlacementError> {
        let jaw = self.get(jaw)?;
        let corner = self.get(mouth_corner)?;
        let eye = self.get(eye_corner)?;
        Ok(NormPoint::new((jaw.x + corner.x) / 2.0, (eye.y + jaw.y) / 2.0))
    }

    fn forehead_norm(&self, eye_corner: L, brow_top: L) -> Result<NormPoint, PlacementError> {
        let eye = self.get(eye_corner)?;
        let brow = self.get(brow_top)?;
        Ok(NormPoint::new(eye.x, brow.y - FOREHEAD_LIFT))
    }

    fn neck_norm(&self, jaw: L) -> Result<NormPoint, PlacementError> {
        let jaw = self.get(jaw)?;
        let chin = self.get(L::ChinBottom)?;
        Ok(NormPoint::new(jaw.x + (chin.x - jaw.x) * NECK_FRACTION, chin.y))
    }

    /// Scan the rows between the lips and return the one whose band of
    /// pixels is, on average, closest to the reference lip color. Ties go to
    /// the row nearest `fallback_y`, so a band without lip signal keeps the
    /// interpolated anchor.
    fn refine_mouth_y(&self, sampler: &dyn PixelSampler, x: i32, fallback_y: i32) -> Result<i32, PlacementError> {
        let (_, top) = self.size.scale(self.get(L::MouthUp)?);
        let (_, bottom) = self.size.scale(self.get(L::MouthDown)?);
        let (y0, y1) = (top.min(bottom).round() as i32, top.max(bottom).round() as i32);
        let half = self.config.mouth_band_half_width as i32;

        let mut best: Option<(f32, i32)> = None;
        for y in y0..=y1 {
            let mut total = 0.0f32;
            let mut count = 0u32;
            for bx in (x - half)..=(x + half) {
                if let Some(px) = sampler.sample(bx, y) {
                    total += color_distance(px, self.config.mouth_color);
                    count += 1;
                }
            }
            if count == 0 {
                continue;
            }
            let mean = total / count as f32;
            let better = best.map_or(true, |(d, by)| {
                mean < d || (mean == d && (y - fallback_y).abs() < (by - fallback_y).abs())
            });
            if better {
                best = Some((mean, y));
            }
        }

        Ok(best.map(|(_, y)| y).unwrap_or(fallback_y))
    }
}

/// Region → derivation lookup table.
fn derivation(region: Region) -> Derivation {
    match region {
        Region::Mouth => |r| r.mouth_norm(),
        Region::Nose => |r| r.nose_norm(),
        Region::Glabella => |r| r.glabella_norm(),
        Region::EyeLeft => |r| r.eye_norm(L::LeftEyeLeft, L::LeftEyeDown),
        Region::EyeRight => |r| r.eye_norm(L::RightEyeRight, L::RightEyeDown),
        Region::ChinLeft => |r| r.chin_norm(L::MidJawlineLeft, L::MouthLeft),
        Region::ChinRight => |r| r.chin_norm(L::MidJawlineRight, L::MouthRight),
        Region::CheekLeft => |r| r.cheek_norm(L::MidJawlineLeft, L::MouthLeft, L::LeftEyeLeft),
        Region::CheekRight => |r| r.cheek_norm(L::MidJawlineRight, L::MouthRight, L::RightEyeRight),
        Region::ForeheadLeft => |r| r.forehead_norm(L::LeftEyeLeft, L::LeftEyeBrowUp),
        Region::ForeheadRight => |r| r.forehead_norm(L::RightEyeRight, L::RightEyeBrowUp),
        Region::NeckLeft => |r| r.neck_norm(L::MidJawlineLeft),
        Region::NeckRight => |r| r.neck_norm(L::MidJawlineRight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::tests::sample_landmarks;
    use image::RgbImage;

    const AVATAR: ImageSize = ImageSize::new(720, 720);

    #[test]
    fn test_mouth_five_eighths_between_lips() {
        let landmarks = LandmarkSet::new()
            .with(L::MouthUp, 0.50, 0.40)
            .with(L::MouthDown, 0.50, 0.46);
        let point = CoordinateResolver::new(AVATAR, &landmarks).mouth().unwrap().unwrap();
        // 288 + 5/8 * (331.2 - 288) = 315
        assert_eq!((point.x, point.y), (360, 315));
    }

    #[test]
    fn test_mouth_refined_towards_lip_color() {
        let landmarks = LandmarkSet::new()
            .with(L::MouthUp, 0.50, 0.40)
            .with(L::MouthDown, 0.50, 0.46);
        let lip = ResolverConfig::default().mouth_color;
        let mut img = RgbImage::from_pixel(720, 720, Rgb([224, 172, 105]));
        for x in 355..=365 {
            img.put_pixel(x, 300, lip);
        }
        let point = CoordinateResolver::new(AVATAR, &landmarks)
            .with_sampler(&img)
            .mouth()
            .unwrap()
            .unwrap();
        assert_eq!((point.x, point.y), (360, 300));
    }

    #[test]
    fn test_mouth_refinement_keeps_interpolated_row_on_uniform_image() {
        let landmarks = LandmarkSet::new()
            .with(L::MouthUp, 0.50, 0.40)
            .with(L::MouthDown, 0.50, 0.46);
        let img = RgbImage::from_pixel(720, 720, Rgb([224, 172, 105]));
        let point = CoordinateResolver::new(AVATAR, &landmarks)
            .with_sampler(&img)
            .mouth()
            .unwrap()
            .unwrap();
        assert_eq!((point.x, point.y), (360, 315));
    }

    #[test]
    fn test_mouth_refinement_tie_prefers_row_nearest_interpolation() {
        let landmarks = LandmarkSet::new()
            .with(L::MouthUp, 0.50, 0.40)
            .with(L::MouthDown, 0.50, 0.46);
        let lip = ResolverConfig::default().mouth_color;
        let mut img = RgbImage::from_pixel(720, 720, Rgb([224, 172, 105]));
        for y in [290, 320] {
            for x in 355..=365 {
                img.put_pixel(x, y, lip);
            }
        }
        let point = CoordinateResolver::new(AVATAR, &landmarks)
            .with_sampler(&img)
            .mouth()
            .unwrap()
            .unwrap();
        assert_eq!(point.y, 320);
    }

    #[test]
    fn test_nose_passthrough() {
        let landmarks = LandmarkSet::new().with(L::Nose, 0.25, 0.5);
        let point = CoordinateResolver::new(ImageSize::new(800, 600), &landmarks)
            .nose()
            .unwrap()
            .unwrap();
        assert_eq!((point.x, point.y), (200, 300));
    }

    #[test]
    fn test_missing_landmark_names_type() {
        let landmarks = LandmarkSet::new().with(L::MouthUp, 0.5, 0.4);
        let err = CoordinateResolver::new(AVATAR, &landmarks).mouth().unwrap_err();
        assert_eq!(err, PlacementError::MissingLandmark(L::MouthDown));
    }

    #[test]
    fn test_glabella_uses_flatter_brow() {
        let landmarks = LandmarkSet::new()
            .with(L::EyeLeft, 0.40, 0.40)
            .with(L::EyeRight, 0.60, 0.40)
            // Left brow raised high, right brow low.
            .with(L::LeftEyeBrowRight, 0.40, 0.20)
            .with(L::RightEyeBrowLeft, 0.60, 0.36);
        let point = CoordinateResolver::new(ImageSize::new(1000, 1000), &landmarks)
            .glabella()
            .unwrap()
            .unwrap();
        // Right offset is -0.02 (smaller than left's -0.10): y = 0.40 - 0.02.
        assert_eq!((point.x, point.y), (500, 380));
    }

    #[test]
    fn test_eye_sits_below_lower_lid() {
        let landmarks = sample_landmarks();
        let resolver = CoordinateResolver::new(ImageSize::new(1000, 1000), &landmarks);
        let left = resolver.eye(Side::Left).unwrap().unwrap();
        let right = resolver.eye(Side::Right).unwrap().unwrap();
        assert_eq!((left.x, left.y), (330, 480));
        assert_eq!((right.x, right.y), (670, 480));
    }

    #[test]
    fn test_chin_cheek_neck_geometry() {
        let landmarks = sample_landmarks();

        // jaw (0.28, 0.66) → mouthLeft (0.42, 0.64) at 5/8 = (0.3675, 0.6475)
        let chin = CoordinateResolver::new(ImageSize::new(800, 800), &landmarks)
            .chin(Side::Left)
            .unwrap()
            .unwrap();
        assert_eq!((chin.x, chin.y), (294, 518));

        let resolver = CoordinateResolver::new(ImageSize::new(1000, 1000), &landmarks);

        // x: mid(0.28, 0.42); y: mid(0.40, 0.66)
        let cheek = resolver.cheek(Side::Left).unwrap().unwrap();
        assert_eq!((cheek.x, cheek.y), (350, 530));

        // x: 0.72 + (0.50 - 0.72) / 4; y: chinBottom
        let neck = resolver.neck(Side::Right).unwrap().unwrap();
        assert_eq!((neck.x, neck.y), (665, 800));
    }

    #[test]
    fn test_forehead_lifted_above_brow() {
        let landmarks = sample_landmarks();
        let resolver = CoordinateResolver::new(ImageSize::new(1000, 1000), &landmarks);
        let point = resolver.forehead(Side::Right).unwrap().unwrap();
        assert_eq!((point.x, point.y), (670, 182));
    }

    #[test]
    fn test_forehead_above_image_is_unavailable() {
        let landmarks = LandmarkSet::new()
            .with(L::LeftEyeLeft, 0.3, 0.2)
            .with(L::LeftEyeBrowUp, 0.3, 0.1);
        let resolver = CoordinateResolver::new(AVATAR, &landmarks);
        assert_eq!(resolver.forehead(Side::Left).unwrap(), None);
    }

    #[test]
    fn test_resolve_all_covers_every_region() {
        let landmarks = sample_landmarks();
        let points = CoordinateResolver::new(AVATAR, &landmarks).resolve_all().unwrap();
        assert_eq!(points.len(), Region::ALL.len());
        for (region, point) in &points {
            assert_eq!(*region, point.region);
        }
    }

    #[test]
    fn test_face_width_from_jawline() {
        let landmarks = sample_landmarks();
        let resolver = CoordinateResolver::new(ImageSize::new(1000, 1000), &landmarks);
        assert!((resolver.face_width() - 440.0).abs() < 1e-2);

        let empty = LandmarkSet::new();
        assert_eq!(CoordinateResolver::new(AVATAR, &empty).face_width(), 720.0);
    }
}
