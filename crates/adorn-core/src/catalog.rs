//! Accessory catalog: immutable, side-aware accessory definitions.
//!
//! The catalog is shared read-only across all images of a run. Each image
//! gets its own shuffled index permutation so no accessory systematically
//! wins region contention.

use crate::types::{Region, Side};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("accessory {name}: probability {value} outside [0, 1]")]
    InvalidProbability { name: String, value: f32 },
    #[error("accessory {0}: no eligible regions")]
    NoRegions(String),
    #[error("duplicate accessory name: {0}")]
    DuplicateName(String),
    #[error("accessory {name}: {side} sticker has zero size")]
    EmptySticker { name: String, side: Side },
    #[error("sticker {path}: cannot determine dimensions: {reason}")]
    Dimensions { path: PathBuf, reason: String },
}

/// How the left/right sticker is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionPolicy {
    /// Follow the subject's facing direction: left sticker when yaw < 0.
    Pose,
    /// Follow the region: left sticker on `-left` regions.
    Symmetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessoryCategory {
    Smoking,
    Tattoo,
    Scar,
    Bandage,
    Other,
}

impl AccessoryCategory {
    /// Never placed on subjects judged underage.
    pub fn is_age_restricted(self) -> bool {
        matches!(self, AccessoryCategory::Smoking | AccessoryCategory::Tattoo)
    }
}

/// One side's sticker art and the pixel within it that aligns to the anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StickerSpec {
    pub asset: PathBuf,
    pub anchor_x: i32,
    pub anchor_y: i32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sides {
    pub left: StickerSpec,
    pub right: StickerSpec,
}

impl Sides {
    pub fn get(&self, side: Side) -> &StickerSpec {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessoryDefinition {
    pub name: String,
    pub category: AccessoryCategory,
    pub probability: f32,
    pub elevation: i32,
    pub direction: DirectionPolicy,
    pub skip_skin_check: bool,
    pub regions: Vec<Region>,
    pub sides: Sides,
}

/// Validated, immutable accessory table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    accessories: Vec<AccessoryDefinition>,
}

impl Catalog {
    pub fn new(accessories: Vec<AccessoryDefinition>) -> Result<Self, CatalogError> {
        Self::validate(&accessories)?;
        Ok(Self { accessories })
    }

    fn validate(accessories: &[AccessoryDefinition]) -> Result<(), CatalogError> {
        let mut names = HashSet::new();
        for acc in accessories {
            if !(0.0..=1.0).contains(&acc.probability) {
                return Err(CatalogError::InvalidProbability {
                    name: acc.name.clone(),
                    value: acc.probability,
                });
            }
            if acc.regions.is_empty() {
                return Err(CatalogError::NoRegions(acc.name.clone()));
            }
            if !names.insert(acc.name.as_str()) {
                return Err(CatalogError::DuplicateName(acc.name.clone()));
            }
            for side in [Side::Left, Side::Right] {
                let sticker = acc.sides.get(side);
                if sticker.width == 0 || sticker.height == 0 {
                    return Err(CatalogError::EmptySticker {
                        name: acc.name.clone(),
                        side,
                    });
                }
            }
        }
        Ok(())
    }

    /// Parse a catalog TOML document.
    ///
    /// Relative sticker paths are joined onto `asset_root`. `probe` supplies
    /// the pixel size of a sticker asset whose dimensions the TOML omits.
    pub fn from_toml_str<F>(src: &str, asset_root: &Path, mut probe: F) -> Result<Self, CatalogError>
    where
        F: FnMut(&Path) -> Result<(u32, u32), String>,
    {
        let file: CatalogFile = toml::from_str(src)?;
        let mut accessories = Vec::with_capacity(file.accessory.len());
        for entry in file.accessory {
            let left = entry.left.resolve(asset_root, &mut probe)?;
            let right = match &entry.right {
                Some(right) => right.resolve(asset_root, &mut probe)?,
                None => left.clone(),
            };
            accessories.push(AccessoryDefinition {
                name: entry.name,
                category: entry.category,
                probability: entry.probability,
                elevation: entry.elevation,
                direction: entry.direction,
                skip_skin_check: entry.skip_skin_check,
                regions: entry.regions,
                sides: Sides { left, right },
            });
        }
        Self::new(accessories)
    }

    pub fn accessories(&self) -> &[AccessoryDefinition] {
        &self.accessories
    }

    pub fn get(&self, index: usize) -> Option<&AccessoryDefinition> {
        self.accessories.get(index)
    }

    pub fn len(&self) -> usize {
        self.accessories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessories.is_empty()
    }

    /// Every region any accessory may occupy.
    pub fn regions(&self) -> BTreeSet<Region> {
        self.accessories
            .iter()
            .flat_map(|a| a.regions.iter().copied())
            .collect()
    }

    /// A fresh random visiting order over the catalog.
    pub fn shuffled_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.accessories.len()).collect();
        order.shuffle(rng);
        order
    }
}

/// On-disk catalog layout: a list of `[[accessory]]` tables.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    accessory: Vec<AccessoryEntry>,
}

#[derive(Debug, Deserialize)]
struct AccessoryEntry {
    name: String,
    category: AccessoryCategory,
    probability: f32,
    #[serde(default = "default_elevation")]
    elevation: i32,
    direction: DirectionPolicy,
    #[serde(default)]
    skip_skin_check: bool,
    regions: Vec<Region>,
    left: StickerEntry,
    /// Mirrors `left` when omitted.
    right: Option<StickerEntry>,
}

fn default_elevation() -> i32 {
    1
}

/// Named anchor positions relative to the sticker's own size.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum AnchorKind {
    #[default]
    Center,
    BottomCenter,
}

#[derive(Debug, Deserialize)]
struct StickerEntry {
    path: PathBuf,
    #[serde(default)]
    anchor: AnchorKind,
    anchor_x: Option<i32>,
    anchor_y: Option<i32>,
    width: Option<u32>,
    height: Option<u32>,
}

impl StickerEntry {
    fn resolve<F>(&self, asset_root: &Path, probe: &mut F) -> Result<StickerSpec, CatalogError>
    where
        F: FnMut(&Path) -> Result<(u32, u32), String>,
    {
        let asset = if self.path.is_absolute() {
            self.path.clone()
        } else {
            asset_root.join(&self.path)
        };

        let (width, height) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            _ => probe(&asset).map_err(|reason| CatalogError::Dimensions {
                path: asset.clone(),
                reason,
            })?,
        };

        let (default_x, default_y) = match self.anchor {
            AnchorKind::Center => (width.div_ceil(2) as i32, height.div_ceil(2) as i32),
            AnchorKind::BottomCenter => (width.div_ceil(2) as i32, height as i32),
        };

        Ok(StickerSpec {
            asset,
            anchor_x: self.anchor_x.unwrap_or(default_x),
            anchor_y: self.anchor_y.unwrap_or(default_y),
            width,
            height,
        })
    }
}
