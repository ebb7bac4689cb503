//! adorn-core — Landmark geometry and accessory placement planning.
//!
//! Turns one face's detector output into a layered set of sticker
//! placements. Pure computation: pixels come in through [`PixelSampler`],
//! randomness through a caller-supplied [`rand::Rng`].

pub mod catalog;
pub mod color;
pub mod coords;
pub mod error;
pub mod face;
pub mod planner;
pub mod pose;
pub mod skin;
pub mod types;

pub use catalog::{AccessoryCategory, AccessoryDefinition, Catalog, CatalogError, DirectionPolicy, StickerSpec};
pub use color::PixelSampler;
pub use coords::{CoordinateResolver, ResolverConfig};
pub use error::{InputError, PlacementError};
pub use face::{FaceAttributes, FaceRecord, LandmarkSet};
pub use planner::{
    CommittedLayer, CompositeInstruction, ImagePlacementRecord, PlacementPlan, Planner, PlannerConfig, ScanArea,
    SizeFitPolicy,
};
pub use pose::PosePolicy;
pub use skin::{SkinReference, SkinToneValidator};
pub use types::{BoundingBox, ImageSize, LandmarkType, NormPoint, Region, RegionPoint, Side};
