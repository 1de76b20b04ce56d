// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use thiserror::Error;

/// Result type for floor plan operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the reconstruction stages
#[derive(Error, Debug)]
pub enum Error {
    #[error("Mask shape mismatch: wall {wall:?}, door {door:?}, window {window:?} (height, width)")]
    ShapeMismatch {
        wall: (u32, u32),
        door: (u32, u32),
        window: (u32, u32),
    },

    #[error("Empty skeleton: {0}")]
    EmptySkeleton(String),

    #[error("No rooms detected (minimum room area {min_area} px)")]
    NoRooms { min_area: u32 },

    #[error("Undetectable footprint: {0}")]
    UndetectableFootprint(String),

    #[error("Degenerate wall graph: {edges} edges, at least 3 required")]
    DegenerateWallGraph { edges: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid GLB container: {0}")]
    InvalidContainer(String),

    #[error("Geometry error: {0}")]
    Geometry(#[from] cutaway_geometry::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for disk and file-system failures, as opposed to geometric ones
    pub fn is_io(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Image(image::ImageError::IoError(_)) => true,
            _ => false,
        }
    }
}

/// Pipeline stage, numbered after the segmentation step that produces the masks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Refine,
    Topology,
    Rooms,
    Normalize,
    Cutaway,
    Openings,
    Validate,
    Export,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::Refine => 2,
            Stage::Topology => 3,
            Stage::Rooms => 4,
            Stage::Normalize => 5,
            Stage::Cutaway => 6,
            Stage::Openings => 7,
            Stage::Validate => 8,
            Stage::Export => 9,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Refine => "wall refinement",
            Stage::Topology => "topology extraction",
            Stage::Rooms => "room detection",
            Stage::Normalize => "metric normalization",
            Stage::Cutaway => "cutaway build",
            Stage::Openings => "opening processing",
            Stage::Validate => "validation",
            Stage::Export => "export",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} ({})", self.number(), self.name())
    }
}

/// A pipeline abort, attributed to the stage that produced it
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct StageFailure {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl StageFailure {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }
}

/// Attach a stage to a stage-local result
pub trait StageContext<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageFailure>;
}

impl<T> StageContext<T> for Result<T> {
    fn stage(self, stage: Stage) -> std::result::Result<T, StageFailure> {
        self.map_err(|source| StageFailure::new(stage, source))
    }
}
