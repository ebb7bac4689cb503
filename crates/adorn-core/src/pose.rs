//! Head-pose policy: which side of a turned face is hidden.

use crate::types::{Region, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maps yaw to the side of the face that is foreshortened or occluded.
///
/// Detectors disagree on the sign convention for yaw, so which side positive
/// yaw hides is configuration rather than a constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosePolicy {
    /// |yaw| in degrees beyond which the hidden side is blacklisted.
    pub yaw_threshold: f32,
    /// Side hidden when yaw is positive.
    pub positive_yaw_hides: Side,
}

impl Default for PosePolicy {
    fn default() -> Self {
        Self {
            yaw_threshold: 15.0,
            positive_yaw_hides: Side::Left,
        }
    }
}

impl PosePolicy {
    /// The side turned away from the camera for the sign of `yaw`.
    pub fn away_side(&self, yaw: f32) -> Side {
        if yaw >= 0.0 {
            self.positive_yaw_hides
        } else {
            self.positive_yaw_hides.opposite()
        }
    }

    /// The side turned towards the camera for the sign of `yaw`.
    pub fn facing_side(&self, yaw: f32) -> Side {
        self.away_side(yaw).opposite()
    }

    /// Whether `side` is turned away by more than `threshold` degrees.
    pub fn is_turned_away(&self, side: Side, yaw: f32, threshold: f32) -> bool {
        yaw.abs() > threshold && self.away_side(yaw) == side
    }

    /// Regions that must not receive an accessory at this yaw.
    pub fn blacklist(&self, yaw: f32) -> BTreeSet<Region> {
        if yaw.abs() <= self.yaw_threshold {
            return BTreeSet::new();
        }
        let hidden = self.away_side(yaw);
        Region::ALL
            .iter()
            .copied()
            .filter(|r| r.side() == Some(hidden))
            .collect()
    }
}
