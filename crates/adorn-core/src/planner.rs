//! Placement planner: decides which accessory goes where on one face.
//!
//! Accessories are visited in a per-image shuffled order. Each one picks a
//! random free region among those it is eligible for and then has to pass,
//! in order: eligibility gates (age, open mouth), the probability draw, the
//! cheek size-fit check, anchor resolution and the skin-tone check. Gate
//! failures are silent skips; only missing input data is an error.

use crate::catalog::{AccessoryDefinition, Catalog, DirectionPolicy};
use crate::color::PixelSampler;
use crate::coords::{CoordinateResolver, ResolverConfig};
use crate::error::PlacementError;
use crate::face::FaceRecord;
use crate::pose::PosePolicy;
use crate::skin::{sample_reference, SkinReference, SkinToneValidator};
use crate::types::{BoundingBox, ImageSize, Region, Side};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Rejects oversized stickers on a cheek seen edge-on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeFitPolicy {
    /// Sticker width / face width above which the check applies.
    pub max_width_ratio: f32,
    /// Yaw in degrees beyond which the turned-away cheek is foreshortened.
    pub yaw_threshold: f32,
}

impl Default for SizeFitPolicy {
    fn default() -> Self {
        Self {
            max_width_ratio: 0.1,
            yaw_threshold: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlannerConfig {
    /// Bypass the probability draw and attempt every accessory.
    pub force_all: bool,
    pub pose: PosePolicy,
    pub size_fit: SizeFitPolicy,
    pub skin: SkinToneValidator,
    pub resolver: ResolverConfig,
}

/// One accepted sticker, positioned in image pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommittedLayer {
    pub asset: PathBuf,
    pub left: i32,
    pub top: i32,
    pub elevation: i32,
    pub region: Region,
    pub accessory: String,
    pub side: Side,
}

/// What the external compositor consumes: `{ input, left, top }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeInstruction {
    pub input: PathBuf,
    pub left: i32,
    pub top: i32,
}

impl From<&CommittedLayer> for CompositeInstruction {
    fn from(layer: &CommittedLayer) -> Self {
        Self {
            input: layer.asset.clone(),
            left: layer.left,
            top: layer.top,
        }
    }
}

/// Region → accessory name for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImagePlacementRecord(BTreeMap<Region, String>);

impl ImagePlacementRecord {
    pub fn get(&self, region: Region) -> Option<&str> {
        self.0.get(&region).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, &str)> + '_ {
        self.0.iter().map(|(r, n)| (*r, n.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, region: Region, accessory: &str) {
        self.0.insert(region, accessory.to_string());
    }
}

/// A skin-tone scan performed while planning, kept for indicator overlays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanArea {
    pub bbox: BoundingBox,
    pub reference: (i32, i32),
    pub accepted: bool,
}

/// Planner output for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementPlan {
    /// Sorted by ascending elevation; ties keep visiting order.
    pub layers: Vec<CommittedLayer>,
    pub record: ImagePlacementRecord,
    pub scans: Vec<ScanArea>,
}

impl PlacementPlan {
    pub fn instructions(&self) -> Vec<CompositeInstruction> {
        self.layers.iter().map(CompositeInstruction::from).collect()
    }
}

pub struct Planner<'a> {
    catalog: &'a Catalog,
    config: PlannerConfig,
}

impl<'a> Planner<'a> {
    pub fn new(catalog: &'a Catalog, config: PlannerConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan accessory placements for one face.
    ///
    /// `sampler` enables mouth refinement and the skin-tone check; without
    /// it, accessories that need the skin check are skipped.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        face: &FaceRecord,
        size: ImageSize,
        sampler: Option<&dyn PixelSampler>,
        rng: &mut R,
    ) -> Result<PlacementPlan, PlacementError> {
        let attrs = &face.attributes;
        if !attrs.yaw.is_finite() {
            return Err(PlacementError::MissingAttribute("Pose.Yaw"));
        }
        let yaw = attrs.yaw;
        let underage = attrs.is_underage();

        let mut resolver = CoordinateResolver::new(size, &face.landmarks).with_config(self.config.resolver);
        if let Some(sampler) = sampler {
            resolver = resolver.with_sampler(sampler);
        }
        let face_width = resolver.face_width();
        let blacklist = self.config.pose.blacklist(yaw);

        let mut filled: BTreeSet<Region> = BTreeSet::new();
        let mut plan = PlacementPlan::default();
        let mut reference: Option<Option<SkinReference>> = None;

        for index in self.catalog.shuffled_order(rng) {
            let Some(accessory) = self.catalog.get(index) else {
                continue;
            };
            let name = accessory.name.as_str();

            let available: Vec<Region> = accessory
                .regions
                .iter()
                .copied()
                .filter(|r| !filled.contains(r) && !blacklist.contains(r))
                .collect();
            let Some(&region) = available.choose(rng) else {
                tracing::debug!(accessory = name, "no available region");
                continue;
            };

            if region == Region::Mouth && (underage || !attrs.mouth_open) {
                tracing::debug!(accessory = name, underage, mouth_open = attrs.mouth_open, "mouth gate");
                continue;
            }
            if accessory.category.is_age_restricted() && underage {
                tracing::debug!(accessory = name, "age-restricted accessory on underage subject");
                continue;
            }

            let side = sticker_side(accessory, region, yaw);
            let sticker = accessory.sides.get(side);

            if !self.config.force_all && !rng.gen_bool(accessory.probability as f64) {
                continue;
            }

            if let Some(cheek_side) = region.side().filter(|_| region.is_cheek()) {
                let ratio = sticker.width as f32 / face_width;
                let foreshortened =
                    self.config
                        .pose
                        .is_turned_away(cheek_side, yaw, self.config.size_fit.yaw_threshold);
                if ratio > self.config.size_fit.max_width_ratio && foreshortened {
                    tracing::debug!(accessory = name, %region, ratio, yaw, "sticker too wide for turned cheek");
                    continue;
                }
            }

            let Some(anchor) = resolver.resolve(region)? else {
                tracing::debug!(accessory = name, %region, "region unavailable");
                continue;
            };

            let bbox = BoundingBox {
                left: anchor.x - sticker.anchor_x,
                top: anchor.y - sticker.anchor_y,
                width: sticker.width,
                height: sticker.height,
            };

            if !accessory.skip_skin_check {
                let Some(sampler) = sampler else {
                    tracing::debug!(accessory = name, "no pixels to validate skin tone");
                    continue;
                };
                let skin_ref = match reference {
                    Some(cached) => cached,
                    None => {
                        let facing = self.config.pose.facing_side(yaw);
                        let sampled = sample_reference(sampler, &face.landmarks, size, facing)?;
                        reference = Some(sampled);
                        sampled
                    }
                };
                let Some(skin_ref) = skin_ref else {
                    tracing::debug!(accessory = name, "skin reference outside image");
                    continue;
                };
                let scan = self.config.skin.scan(sampler, skin_ref.color, bbox);
                let accepted = self.config.skin.accepts(&scan);
                plan.scans.push(ScanArea {
                    bbox,
                    reference: (skin_ref.x, skin_ref.y),
                    accepted,
                });
                if !accepted {
                    tracing::debug!(
                        accessory = name,
                        %region,
                        breaching = scan.breaching,
                        total = scan.total,
                        "skin-tone mismatch"
                    );
                    continue;
                }
            }

            tracing::debug!(accessory = name, %region, %side, left = bbox.left, top = bbox.top, "placed");
            plan.record.insert(region, name);
            plan.layers.push(CommittedLayer {
                asset: sticker.asset.clone(),
                left: bbox.left,
                top: bbox.top,
                elevation: accessory.elevation,
                region,
                accessory: accessory.name.clone(),
                side,
            });
            filled.insert(region);
        }

        plan.layers.sort_by_key(|layer| layer.elevation);
        Ok(plan)
    }
}

/// Which of an accessory's two stickers to use in `region` at `yaw`.
pub fn sticker_side(accessory: &AccessoryDefinition, region: Region, yaw: f32) -> Side {
    match accessory.direction {
        DirectionPolicy::Pose if yaw < 0.0 => Side::Left,
        DirectionPolicy::Pose => Side::Right,
        DirectionPolicy::Symmetry => region.side().unwrap_or(Side::Right),
    }
}
