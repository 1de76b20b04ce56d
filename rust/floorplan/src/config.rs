// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pipeline configuration
//!
//! Every threshold and architectural dimension the stages consume lives
//! here. All structs deserialize from partial JSON: missing fields fall back
//! to their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Closed interval of acceptable values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// True when `value` lies within `margin` (relative) of either bound,
    /// on either side of it
    pub fn near_bound(&self, value: f64, margin: f64) -> bool {
        (value - self.min).abs() <= self.min.abs() * margin
            || (value - self.max).abs() <= self.max.abs() * margin
    }

    /// Inside the range, or outside it by no more than `margin` of a bound
    pub fn tolerates(&self, value: f64, margin: f64) -> bool {
        self.contains(value) || self.near_bound(value, margin)
    }
}

/// Architectural dimension limits, in meters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionLimits {
    pub wall_thickness: Range,
    pub wall_height: Range,
    pub slab_thickness: Range,
    pub window_sill: Range,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            wall_thickness: Range::new(0.20, 0.25),
            wall_height: Range::new(1.3, 1.5),
            slab_thickness: Range::new(0.12, 0.15),
            window_sill: Range::new(0.65, 0.80),
        }
    }
}

/// Wall mask refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Connected wall blobs smaller than this (pixels) are noise
    pub min_blob_area: u32,
    /// Morphological opening radius (pixels), 0 disables it
    pub open_radius: u8,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            min_blob_area: 50,
            open_radius: 0,
        }
    }
}

/// Skeleton to graph extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Douglas-Peucker tolerance for wall chains (pixels)
    pub simplify_epsilon: f64,
    /// Dead-end branches off a junction shorter than this are pruned (pixels)
    pub min_spur_length: f64,
    /// Turn angle below which a degree-2 vertex is dissolved (radians)
    pub collinear_tolerance: f64,
    /// Reconnect wall ends separated by a door or window
    pub bridge_gaps: bool,
    /// Longest gap that may be bridged (pixels)
    pub max_bridge_gap: f64,
    /// Allowed deviation between a bridge and the walls it joins (radians)
    pub bridge_angle_tolerance: f64,
    /// Dilation applied to the opening masks before the coverage test (pixels)
    pub bridge_dilation: u8,
    /// Fraction of a bridge that must cross an opening
    pub bridge_min_coverage: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            simplify_epsilon: 2.0,
            min_spur_length: 8.0,
            collinear_tolerance: 0.2, // ~11 degrees
            bridge_gaps: true,
            max_bridge_gap: 80.0,
            bridge_angle_tolerance: 0.35, // ~20 degrees
            bridge_dilation: 2,
            bridge_min_coverage: 0.5,
        }
    }
}

/// Room detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Minimum room area (square pixels)
    pub min_room_area: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self { min_room_area: 100 }
    }
}

/// Metric normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Assumed real-world width of the building footprint (meters)
    pub target_width_m: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_width_m: 10.0,
        }
    }
}

/// Cutaway mesh dimensions, in meters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CutawayConfig {
    pub wall_thickness: f64,
    pub wall_height: f64,
    pub slab_thickness: f64,
    /// Corners farther than this many half-thicknesses from the vertex fall
    /// back to square ends
    pub miter_limit: f64,
    pub mesh_name: String,
}

impl Default for CutawayConfig {
    fn default() -> Self {
        Self {
            wall_thickness: 0.22,
            wall_height: 1.4,
            slab_thickness: 0.135,
            miter_limit: 4.0,
            mesh_name: "cutaway".to_string(),
        }
    }
}

/// Door and window detection and cutting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpeningConfig {
    pub door_width: f64,
    pub window_width: f64,
    pub window_height: f64,
    pub window_sill: f64,
    /// Opening blobs smaller than this (pixels) are ignored
    pub min_blob_area: u32,
    /// Farthest an opening centroid may be from its host wall (meters)
    pub max_host_distance_m: f64,
    /// Openings narrower than this after clamping are skipped (meters)
    pub min_opening_width: f64,
}

impl Default for OpeningConfig {
    fn default() -> Self {
        Self {
            door_width: 0.9,
            window_width: 0.8,
            window_height: 0.5,
            window_sill: 0.7,
            min_blob_area: 4,
            max_host_distance_m: 1.0,
            min_opening_width: 0.3,
        }
    }
}

/// Validation tolerances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Relative distance to a range bound that raises a warning
    pub warning_margin: f64,
    /// Height tolerance for recognizing edges on the open top plane (meters)
    pub open_top_tolerance: f64,
    /// Faces below this area are degenerate (square meters)
    pub min_face_area: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            warning_margin: 0.05,
            open_top_tolerance: 1e-6,
            min_face_area: 1e-9,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub refine: RefineConfig,
    pub topology: TopologyConfig,
    pub rooms: RoomConfig,
    pub normalize: NormalizeConfig,
    pub cutaway: CutawayConfig,
    pub openings: OpeningConfig,
    pub limits: DimensionLimits,
    pub validation: ValidationConfig,
    /// Refuse to export a mesh that failed validation
    pub require_valid_export: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refine: RefineConfig::default(),
            topology: TopologyConfig::default(),
            rooms: RoomConfig::default(),
            normalize: NormalizeConfig::default(),
            cutaway: CutawayConfig::default(),
            openings: OpeningConfig::default(),
            limits: DimensionLimits::default(),
            validation: ValidationConfig::default(),
            require_valid_export: true,
        }
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} must be positive (got {})",
            name, value
        )))
    }
}

fn within(name: &str, value: f64, range: &Range) -> Result<()> {
    if range.contains(value) {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{} {} outside allowed range {}..{}",
            name, value, range.min, range.max
        )))
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check thresholds and that the configured dimensions respect the limits
    pub fn validate(&self) -> Result<()> {
        positive("topology.simplify_epsilon", self.topology.simplify_epsilon)?;
        positive("topology.collinear_tolerance", self.topology.collinear_tolerance)?;
        positive("topology.max_bridge_gap", self.topology.max_bridge_gap)?;
        positive("topology.bridge_angle_tolerance", self.topology.bridge_angle_tolerance)?;
        if !(0.0..=1.0).contains(&self.topology.bridge_min_coverage) {
            return Err(Error::InvalidConfig(format!(
                "topology.bridge_min_coverage must be within 0..1 (got {})",
                self.topology.bridge_min_coverage
            )));
        }
        if self.rooms.min_room_area == 0 {
            return Err(Error::InvalidConfig(
                "rooms.min_room_area must be at least 1".to_string(),
            ));
        }
        positive("normalize.target_width_m", self.normalize.target_width_m)?;

        let c = &self.cutaway;
        positive("cutaway.miter_limit", c.miter_limit)?;
        within("cutaway.wall_thickness", c.wall_thickness, &self.limits.wall_thickness)?;
        within("cutaway.wall_height", c.wall_height, &self.limits.wall_height)?;
        within("cutaway.slab_thickness", c.slab_thickness, &self.limits.slab_thickness)?;

        let o = &self.openings;
        positive("openings.door_width", o.door_width)?;
        positive("openings.window_width", o.window_width)?;
        positive("openings.window_height", o.window_height)?;
        positive("openings.max_host_distance_m", o.max_host_distance_m)?;
        within("openings.window_sill", o.window_sill, &self.limits.window_sill)?;
        if o.window_sill + o.window_height > c.wall_height {
            return Err(Error::InvalidConfig(format!(
                "window head {} exceeds wall height {}",
                o.window_sill + o.window_height,
                c.wall_height
            )));
        }

        if !(0.0..1.0).contains(&self.validation.warning_margin) {
            return Err(Error::InvalidConfig(format!(
                "validation.warning_margin must be within 0..1 (got {})",
                self.validation.warning_margin
            )));
        }
        Ok(())
    }
}
