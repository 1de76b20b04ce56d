// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Floor plan masks to 3D cutaway models
//!
//! Picks up after segmentation: given wall, door and window masks of one
//! floor plan, this crate
//! 1. Refines the wall mask (stage 2)
//! 2. Thins it to a skeleton and extracts a wall graph (stage 3)
//! 3. Detects rooms as enclosed regions (stage 4)
//! 4. Rescales everything from pixels to meters (stage 5)
//! 5. Extrudes walls and a floor slab into an open-top mesh (stage 6)
//! 6. Cuts door and window voids into their host walls (stage 7)
//! 7. Validates the result (stage 8)
//! 8. Exports it as binary glTF (stage 9)
//!
//! # Usage
//!
//! ```rust,ignore
//! use cutaway_floorplan::{MaskSet, Pipeline, PipelineConfig};
//!
//! let masks = MaskSet::load("wall.png", "door.png", "window.png", 127)?;
//! let pipeline = Pipeline::new(PipelineConfig::default())?;
//! let result = pipeline.run(&masks)?;
//! println!("{} rooms, valid: {}", result.rooms.room_count(), result.validation.passed);
//! result.export("model.glb")?;
//! ```

pub mod config;
pub mod cutaway;
pub mod error;
pub mod glb;
pub mod masks;
pub mod normalizer;
pub mod openings;
pub mod pipeline;
pub mod room_detector;
pub mod topology;
mod union_find;
pub mod validator;
pub mod wall_graph;
pub mod wall_refiner;

pub use config::{
    CutawayConfig, DimensionLimits, NormalizeConfig, OpeningConfig, PipelineConfig, Range,
    RefineConfig, RoomConfig, TopologyConfig, ValidationConfig,
};
pub use cutaway::{build_cutaway, CutawayModel, Interval, WallSpan, WallVoid};
pub use error::{Error, Result, Stage, StageFailure};
pub use glb::{encode_glb, export_glb, parse_glb, GlbExporter, Metadata, ParsedGlb};
pub use masks::MaskSet;
pub use normalizer::{normalize, NormalizationContext, Normalized};
pub use openings::{apply_openings, detect_openings, OpeningKind, OpeningReport, OpeningSpec};
pub use pipeline::{Pipeline, PipelineReport, Reconstruction};
pub use room_detector::{detect_rooms, Room, RoomSet};
pub use topology::{bridge_opening_gaps, extract_topology, thin, Skeleton};
pub use validator::{validate, CheckResult, ValidationResult};
pub use wall_graph::{CoordinateSpace, EdgeId, VertexId, WallEdge, WallGraph};
pub use wall_refiner::{barrier_mask, refine_walls};

// Mesh types from the geometry crate
pub use cutaway_geometry::{Element, Mesh};
