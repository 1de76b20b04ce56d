// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tagged polygon mesh
//!
//! Faces keep their polygon form (quads for wall sides, n-gons for caps)
//! until export, and every face carries the building element it belongs to
//! so individual walls can be located, measured and rebuilt.

use crate::triangulation::polygon_area_vector;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// Building element a face belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    /// Wall prism of a wall-graph edge
    Wall(u32),
    /// Corner hub filling the gap between walls meeting at a vertex
    Junction(u32),
    /// Floor slab
    Slab,
}

impl Element {
    #[inline]
    pub fn is_wall(&self) -> bool {
        matches!(self, Element::Wall(_))
    }
}

/// Polygon face: ordered vertex indices plus its element tag
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub indices: SmallVec<[u32; 4]>,
    pub element: Element,
}

impl Face {
    pub fn new(indices: impl IntoIterator<Item = u32>, element: Element) -> Self {
        Self {
            indices: indices.into_iter().collect(),
            element,
        }
    }

    /// Number of distinct vertex indices
    pub fn distinct_count(&self) -> usize {
        let mut sorted: SmallVec<[u32; 8]> = self.indices.iter().copied().collect();
        sorted.sort_unstable();
        sorted.dedup();
        sorted.len()
    }
}

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Bounds3 {
    fn from_point(p: Point3<f64>) -> Self {
        Self { min: p, max: p }
    }

    fn include(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    #[inline]
    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }
}

/// Named polygon mesh in meters, Y up
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Point3<f64>>,
    pub faces: Vec<Face>,
}

impl Mesh {
    /// Create a new empty mesh
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh with capacity
    pub fn with_capacity(name: impl Into<String>, vertex_count: usize, face_count: usize) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Add a vertex, returning its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        self.vertices.push(position);
        (self.vertices.len() - 1) as u32
    }

    #[inline]
    pub fn add_face(&mut self, indices: impl IntoIterator<Item = u32>, element: Element) {
        self.faces.push(Face::new(indices, element));
    }

    /// Add a face, reversing its winding if its normal points away from `outward`
    pub fn add_face_facing(
        &mut self,
        indices: impl IntoIterator<Item = u32>,
        element: Element,
        outward: &Vector3<f64>,
    ) {
        let mut face = Face::new(indices, element);
        if self.face_area_vector(&face).dot(outward) < 0.0 {
            face.indices.reverse();
        }
        self.faces.push(face);
    }

    /// Positions of a face's vertices, skipping out-of-range indices
    pub fn face_points(&self, face: &Face) -> SmallVec<[Point3<f64>; 4]> {
        face.indices
            .iter()
            .filter_map(|&i| self.vertices.get(i as usize).copied())
            .collect()
    }

    fn face_area_vector(&self, face: &Face) -> Vector3<f64> {
        polygon_area_vector(&self.face_points(face))
    }

    /// Unit normal of a face following its winding (zero for degenerate faces)
    pub fn face_normal(&self, face: &Face) -> Vector3<f64> {
        self.face_area_vector(face)
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Polygon area of a face
    #[inline]
    pub fn face_area(&self, face: &Face) -> f64 {
        self.face_area_vector(face).norm() * 0.5
    }

    /// Merge another mesh into this one
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }
        let vertex_offset = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.faces.extend(other.faces.iter().map(|f| Face {
            indices: f.indices.iter().map(|&i| i + vertex_offset).collect(),
            element: f.element,
        }));
    }

    /// Remove every face tagged with `element`, then drop the vertices no
    /// remaining face uses. Returns the number of removed faces.
    pub fn remove_element(&mut self, element: Element) -> usize {
        let before = self.faces.len();
        self.faces.retain(|f| f.element != element);
        let removed = before - self.faces.len();
        if removed > 0 {
            self.compact_vertices();
        }
        removed
    }

    fn compact_vertices(&mut self) {
        let mut remap = vec![u32::MAX; self.vertices.len()];
        let mut kept = Vec::with_capacity(self.vertices.len());
        for face in &mut self.faces {
            for index in face.indices.iter_mut() {
                let slot = &mut remap[*index as usize];
                if *slot == u32::MAX {
                    *slot = kept.len() as u32;
                    kept.push(self.vertices[*index as usize]);
                }
                *index = *slot;
            }
        }
        self.vertices = kept;
    }

    /// Distinct elements in order of first appearance
    pub fn elements(&self) -> Vec<Element> {
        let mut seen = FxHashSet::default();
        self.faces
            .iter()
            .filter(|f| seen.insert(f.element))
            .map(|f| f.element)
            .collect()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Bounds of all vertices
    pub fn bounds(&self) -> Option<Bounds3> {
        let mut iter = self.vertices.iter();
        let mut bounds = Bounds3::from_point(*iter.next()?);
        iter.for_each(|p| bounds.include(p));
        Some(bounds)
    }

    /// Bounds of the vertices referenced by faces matching `filter`
    pub fn bounds_where(&self, filter: impl Fn(Element) -> bool) -> Option<Bounds3> {
        let mut bounds: Option<Bounds3> = None;
        for face in self.faces.iter().filter(|f| filter(f.element)) {
            for p in self.face_points(face) {
                match bounds.as_mut() {
                    Some(b) => b.include(&p),
                    None => bounds = Some(Bounds3::from_point(p)),
                }
            }
        }
        bounds
    }
}
