//! Typed face model and the validation pass over raw detector output.
//!
//! The detector reports faces as loosely-typed JSON where any field may be
//! absent. [`FaceRecord::from_detector_json`] parses that shape once, at the
//! input boundary, and reports every missing required field together rather
//! than failing later inside whichever region derivation first needs it.

use crate::error::{InputError, PlacementError};
use crate::types::{LandmarkType, NormPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Age below which smoking and tattoo accessories are never placed.
pub const ADULT_AGE: f32 = 18.0;

/// Raw detector output: `{ "FaceDetails": [ ... ] }`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetectorOutput {
    #[serde(rename = "FaceDetails", default)]
    pub face_details: Vec<RawFaceDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFaceDetail {
    #[serde(default)]
    pub landmarks: Vec<RawLandmark>,
    pub pose: Option<RawPose>,
    pub age_range: Option<RawAgeRange>,
    pub mouth_open: Option<RawFlag>,
    pub gender: Option<RawGender>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawLandmark {
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub x: Option<f32>,
    pub y: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPose {
    pub yaw: Option<f32>,
    pub pitch: Option<f32>,
    pub roll: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawAgeRange {
    pub low: Option<u32>,
    pub high: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawFlag {
    pub value: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawGender {
    pub value: Option<String>,
    pub confidence: Option<f32>,
}

/// Landmarks for one face, keyed by type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    points: BTreeMap<LandmarkType, NormPoint>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: LandmarkType, point: NormPoint) {
        self.points.insert(kind, point);
    }

    pub fn with(mut self, kind: LandmarkType, x: f32, y: f32) -> Self {
        self.insert(kind, NormPoint::new(x, y));
        self
    }

    pub fn get(&self, kind: LandmarkType) -> Option<NormPoint> {
        self.points.get(&kind).copied()
    }

    /// Fetch a landmark the caller cannot proceed without.
    pub fn require(&self, kind: LandmarkType) -> Result<NormPoint, PlacementError> {
        self.get(kind).ok_or(PlacementError::MissingLandmark(kind))
    }

    pub fn iter(&self) -> impl Iterator<Item = (LandmarkType, NormPoint)> + '_ {
        self.points.iter().map(|(k, p)| (*k, *p))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gender {
    pub value: String,
    pub confidence: f32,
}

/// Pose and demographic attributes for one detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceAttributes {
    /// Degrees, signed as reported by the detector.
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub age_range_low: u32,
    pub age_range_high: u32,
    pub mouth_open: bool,
    pub gender: Option<Gender>,
    pub confidence: Option<f32>,
}

impl FaceAttributes {
    /// Frontal adult with a closed mouth; handy as a base for overrides.
    pub fn frontal() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            age_range_low: 25,
            age_range_high: 35,
            mouth_open: false,
            gender: None,
            confidence: None,
        }
    }

    pub fn average_age(&self) -> f32 {
        (self.age_range_low as f32 + self.age_range_high as f32) / 2.0
    }

    pub fn is_underage(&self) -> bool {
        self.average_age() < ADULT_AGE
    }
}

/// One validated face: landmarks plus attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRecord {
    pub landmarks: LandmarkSet,
    pub attributes: FaceAttributes,
}

impl FaceRecord {
    /// Parse detector JSON and validate the first face.
    pub fn from_detector_json(json: &str) -> Result<Self, InputError> {
        let output: DetectorOutput = serde_json::from_str(json)?;
        Self::from_detector(&output)
    }

    /// Validate the first face of already-deserialized detector output.
    ///
    /// Every absent required field is collected into a single
    /// [`InputError::MissingFields`].
    pub fn from_detector(output: &DetectorOutput) -> Result<Self, InputError> {
        let face = output.face_details.first().ok_or(InputError::NoFace)?;
        if output.face_details.len() > 1 {
            tracing::debug!(
                faces = output.face_details.len(),
                "multiple faces detected; using the first"
            );
        }

        let mut missing = Vec::new();

        let mut landmarks = LandmarkSet::new();
        for raw in &face.landmarks {
            let (Some(name), Some(x), Some(y)) = (raw.kind.as_deref(), raw.x, raw.y) else {
                tracing::debug!(?raw, "skipping incomplete landmark");
                continue;
            };
            match LandmarkType::from_name(name) {
                Some(kind) => landmarks.insert(kind, NormPoint::new(x, y)),
                None => tracing::debug!(landmark = name, "ignoring unknown landmark type"),
            }
        }
        for kind in LandmarkType::REQUIRED {
            if landmarks.get(kind).is_none() {
                missing.push(format!("Landmarks[{kind}]"));
            }
        }

        let pose = face.pose.as_ref();
        let yaw = pose.and_then(|p| p.yaw);
        if yaw.is_none() {
            missing.push("Pose.Yaw".to_string());
        }

        let age = face.age_range.as_ref();
        let low = age.and_then(|a| a.low);
        let high = age.and_then(|a| a.high);
        if low.is_none() {
            missing.push("AgeRange.Low".to_string());
        }
        if high.is_none() {
            missing.push("AgeRange.High".to_string());
        }

        let mouth_open = face.mouth_open.as_ref().and_then(|m| m.value);
        if mouth_open.is_none() {
            missing.push("MouthOpen.Value".to_string());
        }

        match (yaw, low, high, mouth_open) {
            (Some(yaw), Some(low), Some(high), Some(mouth_open)) if missing.is_empty() => {
                let gender = face.gender.as_ref().and_then(|g| {
                    Some(Gender {
                        value: g.value.clone()?,
                        confidence: g.confidence.unwrap_or(0.0),
                    })
                });
                Ok(Self {
                    landmarks,
                    attributes: FaceAttributes {
                        yaw,
                        pitch: pose.and_then(|p| p.pitch).unwrap_or(0.0),
                        roll: pose.and_then(|p| p.roll).unwrap_or(0.0),
                        age_range_low: low.min(high),
                        age_range_high: high.max(low),
                        mouth_open,
                        gender,
                        confidence: face.confidence,
                    },
                })
            }
            _ => Err(InputError::MissingFields(missing)),
        }
    }
}
