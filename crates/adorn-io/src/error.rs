use adorn_core::{CatalogError, InputError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("{path}: {source}")]
    Fs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("face data {path}: {source}")]
    FaceData {
        path: PathBuf,
        #[source]
        source: InputError,
    },
    #[error("no face data for {image} (expected {expected})")]
    MissingFaceData { image: PathBuf, expected: PathBuf },
    #[error("{image}: image id {id:?} is already used by another input")]
    DuplicateId { image: PathBuf, id: String },
    #[error("no png/jpg images found at {0}")]
    NoImages(PathBuf),
    #[error("catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
}

impl IoError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IoError::Fs {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        IoError::Image {
            path: path.into(),
            source,
        }
    }

    /// Filesystem failures may succeed on retry; malformed data and missing
    /// files never will.
    pub fn is_transient(&self) -> bool {
        match self {
            IoError::Fs { source, .. } => retryable(source),
            IoError::Image {
                source: image::ImageError::IoError(source),
                ..
            } => retryable(source),
            _ => false,
        }
    }
}

fn retryable(err: &std::io::Error) -> bool {
    err.kind() != std::io::ErrorKind::NotFound
}
