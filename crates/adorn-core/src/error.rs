use crate::types::LandmarkType;
use thiserror::Error;

/// Faults that abort planning for the current image only.
///
/// Gate failures (probability, collisions, blacklist, skin mismatch) are not
/// errors; the planner skips those accessories silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("missing landmark: {0}")]
    MissingLandmark(LandmarkType),
    #[error("missing face attribute: {0}")]
    MissingAttribute(&'static str),
}

/// Failures while parsing raw detector output into the typed face model.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid detector output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("detector output contains no faces")]
    NoFace,
    #[error("detector output is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),
}
