//! Input discovery: avatar images and their detector JSON.

use crate::error::IoError;
use adorn_core::FaceRecord;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// One avatar paired with its face-data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputUnit {
    pub image: PathBuf,
    pub face_data: PathBuf,
}

impl InputUnit {
    /// Image file stem, used as the id in logs and the placement report.
    pub fn id(&self) -> String {
        image_id(&self.image)
    }

    pub fn read_face(&self) -> Result<FaceRecord, IoError> {
        if !self.face_data.is_file() {
            return Err(IoError::MissingFaceData {
                image: self.image.clone(),
                expected: self.face_data.clone(),
            });
        }
        read_face(&self.face_data)
    }
}

pub fn image_id(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Collect png/jpg images from a file or a directory (non-recursive), sorted.
pub fn discover_images(input: &Path) -> Result<Vec<PathBuf>, IoError> {
    let meta = std::fs::metadata(input).map_err(|e| IoError::fs(input, e))?;
    let mut images = if meta.is_file() {
        vec![input.to_path_buf()]
    } else {
        let mut found = Vec::new();
        for entry in std::fs::read_dir(input).map_err(|e| IoError::fs(input, e))? {
            let entry = entry.map_err(|e| IoError::fs(input, e))?;
            let path = entry.path();
            if path.is_file() && is_image(&path) {
                found.push(path);
            }
        }
        found
    };
    images.retain(|p| is_image(p));
    images.sort();

    if images.is_empty() {
        return Err(IoError::NoImages(input.to_path_buf()));
    }
    Ok(images)
}

/// Pair every image with `<face_dir>/<stem>.json`.
///
/// Pairing never fails; an image whose face data is missing fails on its
/// own when [`InputUnit::read_face`] runs.
pub fn pair_with_face_data(images: Vec<PathBuf>, face_dir: &Path) -> Vec<InputUnit> {
    images
        .into_iter()
        .map(|image| {
            let face_data = face_dir.join(format!("{}.json", image_id(&image)));
            InputUnit { image, face_data }
        })
        .collect()
}

/// Read and validate one detector JSON file.
pub fn read_face(path: &Path) -> Result<FaceRecord, IoError> {
    let json = std::fs::read_to_string(path).map_err(|e| IoError::fs(path, e))?;
    FaceRecord::from_detector_json(&json).map_err(|source| IoError::FaceData {
        path: path.to_path_buf(),
        source,
    })
}
