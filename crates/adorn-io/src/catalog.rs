//! Accessory catalog loading.
//!
//! The default catalog is embedded at compile time from
//! `contrib/accessories.toml`. A different file can be supplied at runtime;
//! either way sticker paths resolve against the asset directory and missing
//! sticker sizes are read from the image headers.

use crate::error::IoError;
use adorn_core::Catalog;
use std::path::Path;

/// Compile-time embedded default catalog.
pub const DEFAULT_CATALOG: &str = include_str!("../../../contrib/accessories.toml");

/// Read a sticker's pixel size without decoding the whole image.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32), String> {
    image::image_dimensions(path).map_err(|e| e.to_string())
}

/// Load the catalog from `path`, or the embedded default when `None`.
pub fn load_catalog(path: Option<&Path>, asset_dir: &Path) -> Result<Catalog, IoError> {
    let (src, origin) = match path {
        Some(p) => {
            let src = std::fs::read_to_string(p).map_err(|e| IoError::fs(p, e))?;
            (src, p.to_path_buf())
        }
        None => (DEFAULT_CATALOG.to_string(), "<embedded>".into()),
    };

    let catalog =
        Catalog::from_toml_str(&src, asset_dir, probe_dimensions).map_err(|source| IoError::Catalog {
            path: origin.clone(),
            source,
        })?;

    tracing::info!(
        catalog = %origin.display(),
        asset_dir = %asset_dir.display(),
        accessories = catalog.len(),
        "catalog loaded"
    );
    Ok(catalog)
}
