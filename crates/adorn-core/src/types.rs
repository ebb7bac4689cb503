use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One side of the face, from the subject's point of view as labelled by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Side::Left),
            "right" => Ok(Side::Right),
            other => Err(format!("unknown side: {other} (expected left or right)")),
        }
    }
}

/// A nameable facial zone that can host at most one accessory per image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Region {
    Mouth,
    Nose,
    Glabella,
    EyeLeft,
    EyeRight,
    ChinLeft,
    ChinRight,
    CheekLeft,
    CheekRight,
    ForeheadLeft,
    ForeheadRight,
    NeckLeft,
    NeckRight,
}

impl Region {
    pub const ALL: [Region; 13] = [
        Region::Mouth,
        Region::Nose,
        Region::Glabella,
        Region::EyeLeft,
        Region::EyeRight,
        Region::ChinLeft,
        Region::ChinRight,
        Region::CheekLeft,
        Region::CheekRight,
        Region::ForeheadLeft,
        Region::ForeheadRight,
        Region::NeckLeft,
        Region::NeckRight,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Region::Mouth => "mouth",
            Region::Nose => "nose",
            Region::Glabella => "glabella",
            Region::EyeLeft => "eye-left",
            Region::EyeRight => "eye-right",
            Region::ChinLeft => "chin-left",
            Region::ChinRight => "chin-right",
            Region::CheekLeft => "cheek-left",
            Region::CheekRight => "cheek-right",
            Region::ForeheadLeft => "forehead-left",
            Region::ForeheadRight => "forehead-right",
            Region::NeckLeft => "neck-left",
            Region::NeckRight => "neck-right",
        }
    }

    /// The side a bilateral region sits on; `None` for midline regions.
    pub fn side(self) -> Option<Side> {
        match self {
            Region::Mouth | Region::Nose | Region::Glabella => None,
            Region::EyeLeft
            | Region::ChinLeft
            | Region::CheekLeft
            | Region::ForeheadLeft
            | Region::NeckLeft => Some(Side::Left),
            Region::EyeRight
            | Region::ChinRight
            | Region::CheekRight
            | Region::ForeheadRight
            | Region::NeckRight => Some(Side::Right),
        }
    }

    pub fn is_cheek(self) -> bool {
        matches!(self, Region::CheekLeft | Region::CheekRight)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown region: {s}"))
    }
}

/// Landmark types reported by the external face detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandmarkType {
    EyeLeft,
    EyeRight,
    Nose,
    NoseLeft,
    NoseRight,
    MouthLeft,
    MouthRight,
    MouthUp,
    MouthDown,
    LeftPupil,
    RightPupil,
    LeftEyeBrowLeft,
    LeftEyeBrowRight,
    LeftEyeBrowUp,
    RightEyeBrowLeft,
    RightEyeBrowRight,
    RightEyeBrowUp,
    LeftEyeLeft,
    LeftEyeRight,
    LeftEyeUp,
    LeftEyeDown,
    RightEyeLeft,
    RightEyeRight,
    RightEyeUp,
    RightEyeDown,
    UpperJawlineLeft,
    MidJawlineLeft,
    ChinBottom,
    MidJawlineRight,
    UpperJawlineRight,
}

impl LandmarkType {
    const NAMES: [(LandmarkType, &'static str); 30] = [
        (LandmarkType::EyeLeft, "eyeLeft"),
        (LandmarkType::EyeRight, "eyeRight"),
        (LandmarkType::Nose, "nose"),
        (LandmarkType::NoseLeft, "noseLeft"),
        (LandmarkType::NoseRight, "noseRight"),
        (LandmarkType::MouthLeft, "mouthLeft"),
        (LandmarkType::MouthRight, "mouthRight"),
        (LandmarkType::MouthUp, "mouthUp"),
        (LandmarkType::MouthDown, "mouthDown"),
        (LandmarkType::LeftPupil, "leftPupil"),
        (LandmarkType::RightPupil, "rightPupil"),
        (LandmarkType::LeftEyeBrowLeft, "leftEyeBrowLeft"),
        (LandmarkType::LeftEyeBrowRight, "leftEyeBrowRight"),
        (LandmarkType::LeftEyeBrowUp, "leftEyeBrowUp"),
        (LandmarkType::RightEyeBrowLeft, "rightEyeBrowLeft"),
        (LandmarkType::RightEyeBrowRight, "rightEyeBrowRight"),
        (LandmarkType::RightEyeBrowUp, "rightEyeBrowUp"),
        (LandmarkType::LeftEyeLeft, "leftEyeLeft"),
        (LandmarkType::LeftEyeRight, "leftEyeRight"),
        (LandmarkType::LeftEyeUp, "leftEyeUp"),
        (LandmarkType::LeftEyeDown, "leftEyeDown"),
        (LandmarkType::RightEyeLeft, "rightEyeLeft"),
        (LandmarkType::RightEyeRight, "rightEyeRight"),
        (LandmarkType::RightEyeUp, "rightEyeUp"),
        (LandmarkType::RightEyeDown, "rightEyeDown"),
        (LandmarkType::UpperJawlineLeft, "upperJawlineLeft"),
        (LandmarkType::MidJawlineLeft, "midJawlineLeft"),
        (LandmarkType::ChinBottom, "chinBottom"),
        (LandmarkType::MidJawlineRight, "midJawlineRight"),
        (LandmarkType::UpperJawlineRight, "upperJawlineRight"),
    ];

    /// Landmarks the region derivations consume. Detector output lacking any
    /// of these is rejected at the input boundary.
    pub const REQUIRED: [LandmarkType; 18] = [
        LandmarkType::MouthUp,
        LandmarkType::MouthDown,
        LandmarkType::Nose,
        LandmarkType::LeftEyeBrowRight,
        LandmarkType::RightEyeBrowLeft,
        LandmarkType::EyeLeft,
        LandmarkType::EyeRight,
        LandmarkType::LeftEyeDown,
        LandmarkType::LeftEyeLeft,
        LandmarkType::RightEyeDown,
        LandmarkType::RightEyeRight,
        LandmarkType::MidJawlineLeft,
        LandmarkType::MidJawlineRight,
        LandmarkType::MouthLeft,
        LandmarkType::MouthRight,
        LandmarkType::LeftEyeBrowUp,
        LandmarkType::RightEyeBrowUp,
        LandmarkType::ChinBottom,
    ];

    pub fn as_str(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, name)| *name)
            .unwrap_or("unknown")
    }

    /// Look up a landmark type by its detector name (e.g. `"mouthUp"`).
    pub fn from_name(name: &str) -> Option<LandmarkType> {
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(t, _)| *t)
    }
}

impl fmt::Display for LandmarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point in normalized image space, both axes in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    pub x: f32,
    pub y: f32,
}

impl NormPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `other` by fraction `t`.
    pub fn lerp(self, other: NormPoint, t: f32) -> NormPoint {
        NormPoint {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn midpoint(self, other: NormPoint) -> NormPoint {
        self.lerp(other, 0.5)
    }
}

/// Pixel dimensions of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as i64) < self.width as i64 && (y as i64) < self.height as i64
    }

    /// Scale a normalized point to (unrounded) pixel space.
    pub fn scale(&self, p: NormPoint) -> (f32, f32) {
        (p.x * self.width as f32, p.y * self.height as f32)
    }

    /// Scale and round a normalized point to integer pixel coordinates.
    pub fn to_pixel(&self, p: NormPoint) -> (i32, i32) {
        let (x, y) = self.scale(p);
        (x.round() as i32, y.round() as i32)
    }
}

/// Pixel-space anchor for one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionPoint {
    pub region: Region,
    pub x: i32,
    pub y: i32,
}

/// Axis-aligned pixel rectangle, possibly extending beyond the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Iterate every pixel coordinate covered by the box, row-major.
    pub fn pixels(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (left, top) = (self.left, self.top);
        let (w, h) = (self.width as i32, self.height as i32);
        (top..top + h).flat_map(move |y| (left..left + w).map(move |x| (x, y)))
    }
}
