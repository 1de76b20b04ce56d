// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cutaway Geometry
//!
//! Tagged polygon meshes for cutaway building models: closed prism
//! extrusion from plan footprints, earcutr triangulation that keeps face
//! winding, and the 2D polygon helpers the footprint builders need.

pub mod error;
pub mod extrusion;
pub mod mesh;
pub mod polygon;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use error::{Error, Result};
pub use extrusion::{extrude_prism, plan_to_world};
pub use mesh::{Bounds3, Element, Face, Mesh};
pub use polygon::{
    convex_hull, line_intersection, offset_convex_polygon, point_segment_distance,
    project_onto_segment, signed_area,
};
pub use triangulation::{
    calculate_polygon_normal, polygon_area_vector, project_to_2d, triangulate_face,
    triangulate_polygon,
};
